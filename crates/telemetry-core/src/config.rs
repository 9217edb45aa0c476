// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven agent configuration.
//!
//! Every knob is supplied externally through `TELEMETRY_*` variables; only
//! the ingestion endpoint URL has no default. Malformed numeric values fall
//! back to the default for that knob.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 10;
const DEFAULT_UPLOAD_INTERVAL_SECS: u64 = 20;
const DEFAULT_QUEUE_CAPACITY: usize = 4096;
const DEFAULT_MAX_BATCH_SIZE: usize = 500;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF_BASE_MS: u64 = 100;
const DEFAULT_RETRY_BACKOFF_CEILING_MS: u64 = 5_000;
const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 3;
const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
const DEFAULT_LISTEN_PORT: u16 = 12345;
const DEFAULT_METRICS: &str = "cpu_usage,memory_usage,process_count";

#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion endpoint URL batches are POSTed to.
    pub intake_url: String,
    /// How often the collector reads local counters.
    pub sample_interval: Duration,
    /// How often the uploader drains and transmits.
    pub upload_interval: Duration,
    pub queue_capacity: usize,
    pub max_batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_base: Duration,
    pub retry_backoff_ceiling: Duration,
    /// Per-transmission network timeout.
    pub flush_timeout: Duration,
    /// Budget for the final flush during shutdown.
    pub shutdown_timeout: Duration,
    pub listen_host: String,
    pub listen_port: u16,
    /// Local metrics the collector reads each tick.
    pub metrics: Vec<String>,
    pub trust_device_timestamp: bool,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let intake_url =
            env::var("TELEMETRY_INTAKE_URL").map_err(|_| ConfigError::MissingIntakeUrl)?;

        let metrics = env::var("TELEMETRY_METRICS")
            .unwrap_or_else(|_| DEFAULT_METRICS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        let trust_device_timestamp = env::var("TELEMETRY_TRUST_DEVICE_TIMESTAMP")
            .map(|val| matches!(val.to_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        Ok(Config {
            intake_url,
            sample_interval: Duration::from_secs(env_parse(
                "TELEMETRY_SAMPLE_INTERVAL_SECS",
                DEFAULT_SAMPLE_INTERVAL_SECS,
            )),
            upload_interval: Duration::from_secs(env_parse(
                "TELEMETRY_UPLOAD_INTERVAL_SECS",
                DEFAULT_UPLOAD_INTERVAL_SECS,
            )),
            queue_capacity: env_parse("TELEMETRY_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            max_batch_size: env_parse("TELEMETRY_MAX_BATCH_SIZE", DEFAULT_MAX_BATCH_SIZE),
            max_retries: env_parse("TELEMETRY_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_backoff_base: Duration::from_millis(env_parse(
                "TELEMETRY_RETRY_BACKOFF_BASE_MS",
                DEFAULT_RETRY_BACKOFF_BASE_MS,
            )),
            retry_backoff_ceiling: Duration::from_millis(env_parse(
                "TELEMETRY_RETRY_BACKOFF_CEILING_MS",
                DEFAULT_RETRY_BACKOFF_CEILING_MS,
            )),
            flush_timeout: Duration::from_secs(env_parse(
                "TELEMETRY_FLUSH_TIMEOUT_SECS",
                DEFAULT_FLUSH_TIMEOUT_SECS,
            )),
            shutdown_timeout: Duration::from_secs(env_parse(
                "TELEMETRY_SHUTDOWN_TIMEOUT_SECS",
                DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            )),
            listen_host: env::var("TELEMETRY_LISTEN_HOST")
                .unwrap_or_else(|_| DEFAULT_LISTEN_HOST.to_string()),
            listen_port: env_parse("TELEMETRY_LISTEN_PORT", DEFAULT_LISTEN_PORT),
            metrics,
            trust_device_timestamp,
        })
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}
