// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the ingestion endpoint.

use std::time::Duration;

use tracing::debug;

use crate::errors::ShipError;
use crate::metric::MetricSample;

/// Ships batches of samples to the ingestion endpoint.
///
/// The endpoint is a black box: any non-success status and any
/// connection or timeout error are the same failure from the uploader's
/// point of view.
#[derive(Clone)]
pub struct IntakeClient {
    client: reqwest::Client,
    endpoint_url: String,
    timeout: Duration,
}

impl IntakeClient {
    #[must_use]
    pub fn new(endpoint_url: String, timeout: Duration) -> IntakeClient {
        IntakeClient {
            client: reqwest::Client::new(),
            endpoint_url,
            timeout,
        }
    }

    /// POST one batch as a JSON array of sample records.
    pub async fn ship_batch(&self, batch: &[MetricSample]) -> Result<(), ShipError> {
        let resp = self
            .client
            .post(&self.endpoint_url)
            .timeout(self.timeout)
            .json(batch)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!("shipped batch of {} samples", batch.len());
            Ok(())
        } else {
            Err(ShipError::Destination { status })
        }
    }
}
