// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry collection and delivery pipeline.
//!
//! Samples flow from two producers into a single bounded queue, and from
//! there to the ingestion endpoint in timed batches:
//!
//! ```text
//!   Collector ──────┐
//!                   v
//!              DeliveryQueue ──> Uploader ──> IntakeClient ──> endpoint
//!                   ^
//!   DatagramListener┘
//! ```
//!
//! The queue is the only shared mutable state. The uploader is its single
//! consumer, so the endpoint never sees overlapping batches from one agent.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod collector;
pub mod config;
pub mod errors;
pub mod intake;
pub mod listener;
pub mod metric;
pub mod payload;
pub mod queue;
pub mod uploader;
