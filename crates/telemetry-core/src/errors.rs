// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors decoding an embedded-device datagram payload.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("packet is not valid UTF-8")]
    NotUtf8,

    #[error("unrecognized payload format: {0:?}")]
    UnrecognizedFormat(String),

    #[error("temperature is not a finite number")]
    NonFiniteValue,
}

/// Errors reading a local performance counter.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("unsupported metric {0:?}")]
    UnsupportedMetric(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse contents of {path}")]
    Malformed { path: &'static str },
}

/// Errors shipping a batch to the ingestion endpoint.
///
/// The uploader treats every variant the same way: the transmission failed.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("failed to reach ingestion endpoint: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ingestion endpoint returned {status}")]
    Destination { status: StatusCode },
}

/// Errors building the agent configuration.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("TELEMETRY_INTAKE_URL environment variable is not set")]
    MissingIntakeUrl,
}
