// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sample data model shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};

/// Which producer observed a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    /// Sampled from local machine performance counters.
    Local,
    /// Received from an embedded device over the datagram listener.
    Embedded,
}

/// One timestamped metric observation.
///
/// The timestamp is fixed at the moment of observation and is never
/// rewritten by the queue or the uploader, so queueing delay does not skew
/// the measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub source: SampleSource,
    pub metric_name: String,
    pub value: f64,
    /// Unix epoch seconds at the moment of observation.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Identifier of the machine or device that produced the reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl MetricSample {
    /// New sample timestamped now, with no unit or device metadata.
    pub fn new(source: SampleSource, metric_name: impl Into<String>, value: f64) -> MetricSample {
        MetricSample {
            source,
            metric_name: metric_name.into(),
            value,
            timestamp: now_timestamp(),
            unit: None,
            device: None,
        }
    }
}

/// Current time as Unix epoch seconds.
pub fn now_timestamp() -> i64 {
    std::time::UNIX_EPOCH
        .elapsed()
        .map(|d| d.as_secs().try_into().unwrap_or_default())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assigns_capture_timestamp() {
        let before = now_timestamp();
        let sample = MetricSample::new(SampleSource::Local, "cpu_usage", 42.0);
        let after = now_timestamp();

        assert!(sample.timestamp >= before && sample.timestamp <= after);
        assert_eq!(sample.metric_name, "cpu_usage");
        assert_eq!(sample.unit, None);
        assert_eq!(sample.device, None);
    }

    #[test]
    fn test_serialized_record_shape() {
        let sample = MetricSample {
            source: SampleSource::Embedded,
            metric_name: "temperature".to_string(),
            value: 23.5,
            timestamp: 1700000000,
            unit: Some("celsius".to_string()),
            device: Some("esp32-1".to_string()),
        };

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "source": "embedded",
                "metric_name": "temperature",
                "value": 23.5,
                "timestamp": 1700000000,
                "unit": "celsius",
                "device": "esp32-1",
            })
        );
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let sample = MetricSample {
            source: SampleSource::Local,
            metric_name: "cpu_usage".to_string(),
            value: 12.0,
            timestamp: 1700000000,
            unit: None,
            device: None,
        };

        let json = serde_json::to_string(&sample).unwrap();
        assert!(!json.contains("unit"));
        assert!(!json.contains("device"));

        // and a record without them still deserializes
        let parsed: MetricSample = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample);
    }
}
