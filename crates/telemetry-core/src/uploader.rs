// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Interval-driven batch delivery with bounded retry.
//!
//! The uploader is the single consumer of the delivery queue. Each tick it
//! drains one batch and walks an explicit state machine:
//!
//! ```text
//!   Idle -> Draining -> Transmitting -> Success
//!                  \               \-> Failed (retry with backoff,
//!                   \-> Idle (empty)            then drop)
//! ```
//!
//! A failed transmission is retried immediately with exponential backoff,
//! capped at a ceiling, up to `max_retries` re-attempts; a batch is
//! attempted at most `1 + max_retries` times in total. Exhausted batches
//! are dropped, never re-enqueued, and the loss is logged exactly once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::intake::IntakeClient;
use crate::queue::DeliveryQueue;

/// Outcome of one flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued; no network call was made.
    Empty,
    /// The batch was accepted by the ingestion endpoint.
    Delivered(usize),
    /// Retries were exhausted; the batch was dropped.
    Dropped(usize),
}

pub struct UploaderConfig {
    /// How often to drain and transmit, e.g. every 20s.
    pub upload_interval: Duration,
    /// Maximum samples drained into one batch.
    pub max_batch_size: usize,
    /// Re-attempts after the first failed transmission.
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt.
    pub retry_backoff_base: Duration,
    /// Upper bound on any single backoff delay.
    pub retry_backoff_ceiling: Duration,
    /// Budget for the final flush during shutdown.
    pub shutdown_timeout: Duration,
}

/// Single consumer draining the queue and delivering batches.
pub struct Uploader {
    queue: Arc<DeliveryQueue>,
    client: IntakeClient,
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(
        queue: Arc<DeliveryQueue>,
        client: IntakeClient,
        config: UploaderConfig,
    ) -> Uploader {
        Uploader {
            queue,
            client,
            config,
        }
    }

    /// Drain one batch and attempt delivery.
    pub async fn flush(&self) -> FlushOutcome {
        let batch = self.queue.drain(self.config.max_batch_size);
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.client.ship_batch(&batch).await {
                Ok(()) => {
                    debug!(
                        "delivered batch of {} samples in {attempts} attempt(s)",
                        batch.len()
                    );
                    return FlushOutcome::Delivered(batch.len());
                }
                Err(e) if attempts > self.config.max_retries => {
                    error!(
                        "data loss: dropping batch of {} samples after {attempts} attempts: {e}",
                        batch.len()
                    );
                    return FlushOutcome::Dropped(batch.len());
                }
                Err(e) => {
                    warn!("transmission failed (attempt {attempts}): {e}");
                }
            }

            let backoff = self
                .config
                .retry_backoff_base
                .saturating_mul(1 << (attempts - 1).min(16))
                .min(self.config.retry_backoff_ceiling);
            tokio::time::sleep(backoff).await;
        }
    }

    /// Periodic flush loop. On cancellation performs one final best-effort
    /// drain-and-flush bounded by the shutdown timeout, then exits.
    pub async fn run(self, cancel_token: tokio_util::sync::CancellationToken) {
        let mut flush_interval = tokio::time::interval(self.config.upload_interval);
        flush_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                _ = flush_interval.tick() => {
                    self.flush().await;
                }
                () = cancel_token.cancelled() => {
                    info!("shutting down, flushing remaining samples");
                    if tokio::time::timeout(self.config.shutdown_timeout, self.flush())
                        .await
                        .is_err()
                    {
                        warn!("final flush timed out");
                    }
                    break;
                }
            }
        }
        debug!("uploader stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{MetricSample, SampleSource};
    use mockito::{Matcher, Server, ServerGuard};
    use tracing_test::traced_test;

    fn test_uploader(queue: Arc<DeliveryQueue>, server: &ServerGuard) -> Uploader {
        let client = IntakeClient::new(
            format!("{}/metrics", server.url()),
            Duration::from_secs(1),
        );
        Uploader::new(
            queue,
            client,
            UploaderConfig {
                upload_interval: Duration::from_secs(5),
                max_batch_size: 100,
                max_retries: 2,
                retry_backoff_base: Duration::from_millis(1),
                retry_backoff_ceiling: Duration::from_millis(4),
                shutdown_timeout: Duration::from_secs(1),
            },
        )
    }

    fn sample(value: f64) -> MetricSample {
        MetricSample::new(SampleSource::Local, "cpu_usage", value)
    }

    #[tokio::test]
    async fn test_flush_delivers_and_empties_queue() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/metrics")
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let queue = Arc::new(DeliveryQueue::new(10));
        queue.push(sample(42.0));
        let uploader = test_uploader(Arc::clone(&queue), &server);

        assert_eq!(uploader.flush().await, FlushOutcome::Delivered(1));
        assert!(queue.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_flush_empty_queue_makes_no_network_call() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/metrics")
            .with_status(201)
            .expect(0)
            .create_async()
            .await;

        let queue = Arc::new(DeliveryQueue::new(10));
        let uploader = test_uploader(Arc::clone(&queue), &server);

        assert_eq!(uploader.flush().await, FlushOutcome::Empty);
        mock.assert_async().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failing_endpoint_exhausts_retries_then_drops() {
        let mut server = Server::new_async().await;
        // retry limit 2: the batch is attempted at most 3 times total
        let mock = server
            .mock("POST", "/metrics")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let queue = Arc::new(DeliveryQueue::new(10));
        queue.push(sample(42.0));
        let uploader = test_uploader(Arc::clone(&queue), &server);

        assert_eq!(uploader.flush().await, FlushOutcome::Dropped(1));
        assert!(queue.is_empty());
        mock.assert_async().await;

        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("data loss")).count() {
                1 => Ok(()),
                n => Err(format!("expected exactly one data-loss event, saw {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_failure_then_success_delivers() {
        let mut server = Server::new_async().await;
        let failed = server
            .mock("POST", "/metrics")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let succeeded = server
            .mock("POST", "/metrics")
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let queue = Arc::new(DeliveryQueue::new(10));
        queue.push(sample(42.0));
        let uploader = test_uploader(Arc::clone(&queue), &server);

        assert_eq!(uploader.flush().await, FlushOutcome::Delivered(1));
        failed.assert_async().await;
        succeeded.assert_async().await;
    }

    #[tokio::test]
    async fn test_flush_transmits_capture_timestamps() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/metrics")
            .match_body(Matcher::PartialJson(serde_json::json!([
                {"metric_name": "cpu_usage", "timestamp": 1600000000}
            ])))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let queue = Arc::new(DeliveryQueue::new(10));
        let mut aged = sample(42.0);
        aged.timestamp = 1600000000; // captured long before the flush
        queue.push(aged);
        let uploader = test_uploader(Arc::clone(&queue), &server);

        assert_eq!(uploader.flush().await, FlushOutcome::Delivered(1));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_performs_final_flush_on_cancellation() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/metrics")
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let queue = Arc::new(DeliveryQueue::new(10));
        queue.push(sample(42.0));
        // long upload interval: only the shutdown flush can deliver
        let uploader = test_uploader(Arc::clone(&queue), &server);
        let cancel_token = tokio_util::sync::CancellationToken::new();

        let task = tokio::spawn(uploader.run(cancel_token.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("uploader did not stop")
            .expect("uploader task failed");

        assert!(queue.is_empty());
        mock.assert_async().await;
    }
}
