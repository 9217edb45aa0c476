// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO buffer decoupling the producers from the uploader.
//!
//! The queue favors fresh data over completeness: when it is full, a push
//! evicts the oldest sample instead of rejecting the new one. Unbounded
//! growth during a sustained network outage is the failure mode this
//! bounds.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::metric::MetricSample;

/// Thread-safe bounded FIFO queue of samples awaiting upload.
///
/// All access is serialized by the internal lock; the only operations are
/// `push` and `drain`, so a sample is either queued or owned by exactly one
/// drained batch, never both.
pub struct DeliveryQueue {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    samples: VecDeque<MetricSample>,
    dropped: u64,
}

impl DeliveryQueue {
    #[must_use]
    pub fn new(capacity: usize) -> DeliveryQueue {
        DeliveryQueue {
            inner: Mutex::new(Inner {
                samples: VecDeque::with_capacity(capacity.max(1)),
                dropped: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue one sample, never blocking.
    ///
    /// When the queue is at capacity the oldest sample is evicted to make
    /// room; the evicted sample is returned so callers can observe the
    /// loss.
    pub fn push(&self, sample: MetricSample) -> Option<MetricSample> {
        let mut inner = self.lock();
        let evicted = if inner.samples.len() >= self.capacity {
            inner.dropped += 1;
            let oldest = inner.samples.pop_front();
            warn!(
                "delivery queue full ({} samples), dropping oldest sample",
                self.capacity
            );
            oldest
        } else {
            None
        };
        inner.samples.push_back(sample);
        evicted
    }

    /// Atomically remove up to `max_batch_size` samples in FIFO order.
    ///
    /// Returns an empty `Vec` when nothing is queued.
    pub fn drain(&self, max_batch_size: usize) -> Vec<MetricSample> {
        let mut inner = self.lock();
        let take = max_batch_size.min(inner.samples.len());
        inner.samples.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// Total samples evicted by the overflow policy since creation.
    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        #[allow(clippy::expect_used)]
        self.inner.lock().expect("lock poisoned")
    }
}
