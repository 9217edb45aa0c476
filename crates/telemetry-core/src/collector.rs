// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Local performance counter sampling.
//!
//! Reads counters from Linux kernel pseudo-files and enqueues one sample
//! per configured metric each tick. A counter that cannot be read is
//! skipped without aborting the tick.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::CollectError;
use crate::metric::{now_timestamp, MetricSample, SampleSource};
use crate::queue::DeliveryQueue;

const PROC_LOADAVG_PATH: &str = "/proc/loadavg"; // load averages and runnable/total process counts
const PROC_MEMINFO_PATH: &str = "/proc/meminfo"; // per-row memory accounting in kB
const PROC_UPTIME_PATH: &str = "/proc/uptime"; // seconds since boot
const PROC_HOSTNAME_PATH: &str = "/proc/sys/kernel/hostname";

const KB_PER_MB: f64 = 1024.0;

/// One counter observation: the value and the unit it is reported in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: &'static str,
}

/// Source of local performance counters.
pub trait CounterReader: Send + Sync {
    fn read(&self, metric: &str) -> Result<Reading, CollectError>;
}

/// Reads performance counters from `/proc`.
///
/// Supported metrics: `cpu_usage` (1-minute load over core count, percent),
/// `memory_usage` and `memory_available` (megabytes), `process_count`, and
/// `uptime` (seconds).
pub struct ProcCounterReader;

impl CounterReader for ProcCounterReader {
    fn read(&self, metric: &str) -> Result<Reading, CollectError> {
        match metric {
            "cpu_usage" => {
                let contents = read_proc(PROC_LOADAVG_PATH)?;
                let load = parse_loadavg_1m(&contents).ok_or(CollectError::Malformed {
                    path: PROC_LOADAVG_PATH,
                })?;
                let cores = num_cpus::get() as f64;
                Ok(Reading {
                    value: load / cores * 100.0,
                    unit: "percent",
                })
            }
            "memory_usage" => {
                let contents = read_proc(PROC_MEMINFO_PATH)?;
                let total = parse_meminfo_kb(&contents, "MemTotal");
                let available = parse_meminfo_kb(&contents, "MemAvailable");
                match (total, available) {
                    (Some(total), Some(available)) => Ok(Reading {
                        value: (total - available) / KB_PER_MB,
                        unit: "megabytes",
                    }),
                    _ => Err(CollectError::Malformed {
                        path: PROC_MEMINFO_PATH,
                    }),
                }
            }
            "memory_available" => {
                let contents = read_proc(PROC_MEMINFO_PATH)?;
                let available =
                    parse_meminfo_kb(&contents, "MemAvailable").ok_or(CollectError::Malformed {
                        path: PROC_MEMINFO_PATH,
                    })?;
                Ok(Reading {
                    value: available / KB_PER_MB,
                    unit: "megabytes",
                })
            }
            "process_count" => {
                let contents = read_proc(PROC_LOADAVG_PATH)?;
                let count = parse_loadavg_processes(&contents).ok_or(CollectError::Malformed {
                    path: PROC_LOADAVG_PATH,
                })?;
                Ok(Reading {
                    value: count,
                    unit: "count",
                })
            }
            "uptime" => {
                let contents = read_proc(PROC_UPTIME_PATH)?;
                let uptime = parse_uptime_secs(&contents).ok_or(CollectError::Malformed {
                    path: PROC_UPTIME_PATH,
                })?;
                Ok(Reading {
                    value: uptime,
                    unit: "seconds",
                })
            }
            other => Err(CollectError::UnsupportedMetric(other.to_string())),
        }
    }
}

fn read_proc(path: &'static str) -> Result<String, CollectError> {
    fs::read_to_string(path).map_err(|source| CollectError::Read { path, source })
}

/// First field of `/proc/loadavg`: the 1-minute load average.
fn parse_loadavg_1m(contents: &str) -> Option<f64> {
    contents.split_whitespace().next()?.parse().ok()
}

/// Fourth field of `/proc/loadavg` is `runnable/total`; returns the total.
fn parse_loadavg_processes(contents: &str) -> Option<f64> {
    contents
        .split_whitespace()
        .nth(3)?
        .split('/')
        .nth(1)?
        .parse()
        .ok()
}

/// Value of one `/proc/meminfo` row in kB, e.g. `MemTotal: 16316412 kB`.
fn parse_meminfo_kb(contents: &str, key: &str) -> Option<f64> {
    contents.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

fn parse_uptime_secs(contents: &str) -> Option<f64> {
    contents.split_whitespace().next()?.parse().ok()
}

/// Local hostname, used as the device identifier for local samples.
pub fn local_hostname() -> Option<String> {
    fs::read_to_string(PROC_HOSTNAME_PATH)
        .ok()
        .map(|s| s.trim().to_string())
}

/// Periodic producer of local samples.
pub struct Collector {
    queue: Arc<DeliveryQueue>,
    reader: Box<dyn CounterReader>,
    metrics: Vec<String>,
    interval: Duration,
    device: Option<String>,
}

impl Collector {
    pub fn new(
        queue: Arc<DeliveryQueue>,
        reader: Box<dyn CounterReader>,
        metrics: Vec<String>,
        interval: Duration,
    ) -> Collector {
        Collector {
            queue,
            reader,
            metrics,
            interval,
            device: local_hostname(),
        }
    }

    /// Read every configured metric once and enqueue the readings.
    ///
    /// An unreadable metric is skipped and logged; the rest of the tick
    /// proceeds. No network I/O happens here.
    pub fn tick(&self) {
        for metric in &self.metrics {
            match self.reader.read(metric) {
                Ok(reading) => {
                    self.queue.push(MetricSample {
                        source: SampleSource::Local,
                        metric_name: metric.clone(),
                        value: reading.value,
                        timestamp: now_timestamp(),
                        unit: Some(reading.unit.to_string()),
                        device: self.device.clone(),
                    });
                }
                Err(e) => warn!("skipping metric {metric}: {e}"),
            }
        }
    }

    /// Periodic sampling loop. Exits when the token is cancelled.
    pub async fn run(self, cancel_token: tokio_util::sync::CancellationToken) {
        let mut tick_interval = tokio::time::interval(self.interval);
        tick_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                _ = tick_interval.tick() => self.tick(),
                () = cancel_token.cancelled() => break,
            }
        }
        debug!("collector stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    const LOADAVG: &str = "0.52 0.58 0.59 2/1253 12345\n";
    const MEMINFO: &str = "MemTotal:       16316412 kB\n\
                           MemFree:         1093708 kB\n\
                           MemAvailable:    9134972 kB\n\
                           Buffers:          527432 kB\n";
    const UPTIME: &str = "35420.90 270369.10\n";

    struct FakeReader {
        readings: HashMap<&'static str, f64>,
    }

    impl CounterReader for FakeReader {
        fn read(&self, metric: &str) -> Result<Reading, CollectError> {
            self.readings
                .get(metric)
                .map(|&value| Reading {
                    value,
                    unit: "percent",
                })
                .ok_or_else(|| CollectError::UnsupportedMetric(metric.to_string()))
        }
    }

    fn fake_collector(queue: Arc<DeliveryQueue>, metrics: &[&str]) -> Collector {
        Collector::new(
            queue,
            Box::new(FakeReader {
                readings: HashMap::from([("cpu_usage", 42.0), ("memory_usage", 512.0)]),
            }),
            metrics.iter().map(|m| (*m).to_string()).collect(),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_tick_enqueues_one_sample_per_metric() {
        let queue = Arc::new(DeliveryQueue::new(16));
        let collector = fake_collector(Arc::clone(&queue), &["cpu_usage", "memory_usage"]);

        collector.tick();

        let samples = queue.drain(16);
        assert_eq!(samples.len(), 2);
        assert!(samples
            .iter()
            .all(|s| s.source == SampleSource::Local && s.unit.is_some()));
        assert_eq!(samples[0].metric_name, "cpu_usage");
        assert_eq!(samples[0].value, 42.0);
    }

    #[test]
    #[traced_test]
    fn test_tick_skips_unreadable_metric() {
        let queue = Arc::new(DeliveryQueue::new(16));
        let collector = fake_collector(Arc::clone(&queue), &["cpu_usage", "nope", "memory_usage"]);

        collector.tick();

        assert!(logs_contain("skipping metric nope"));
        // the failing metric did not abort the tick
        let samples = queue.drain(16);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_parse_loadavg_1m() {
        assert_eq!(parse_loadavg_1m(LOADAVG), Some(0.52));
        assert_eq!(parse_loadavg_1m(""), None);
        assert_eq!(parse_loadavg_1m("garbage"), None);
    }

    #[test]
    fn test_parse_loadavg_processes() {
        assert_eq!(parse_loadavg_processes(LOADAVG), Some(1253.0));
        assert_eq!(parse_loadavg_processes("0.52 0.58 0.59"), None);
    }

    #[test]
    fn test_parse_meminfo_kb() {
        assert_eq!(parse_meminfo_kb(MEMINFO, "MemTotal"), Some(16316412.0));
        assert_eq!(parse_meminfo_kb(MEMINFO, "MemAvailable"), Some(9134972.0));
        assert_eq!(parse_meminfo_kb(MEMINFO, "SwapTotal"), None);
    }

    #[test]
    fn test_parse_uptime_secs() {
        assert_eq!(parse_uptime_secs(UPTIME), Some(35420.90));
        assert_eq!(parse_uptime_secs(""), None);
    }

    #[test]
    fn test_proc_reader_rejects_unknown_metric() {
        let err = ProcCounterReader.read("disk_io").unwrap_err();
        assert!(matches!(err, CollectError::UnsupportedMetric(_)));
    }

    #[tokio::test]
    async fn test_run_exits_on_cancellation() {
        let queue = Arc::new(DeliveryQueue::new(16));
        let collector = fake_collector(queue, &["cpu_usage"]);
        let cancel_token = tokio_util::sync::CancellationToken::new();
        cancel_token.cancel();

        tokio::time::timeout(Duration::from_secs(1), collector.run(cancel_token))
            .await
            .expect("run did not exit after cancellation");
    }
}
