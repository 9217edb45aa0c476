// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire formats for embedded-device telemetry packets.
//!
//! Two payload shapes arrive on the datagram socket: a JSON record
//! (`{"device":"esp32-1","temperature":23.5}`, optionally with a
//! device-side `timestamp`) and the legacy firmware line
//! `Temperature: 23.5 C`, which carries no device identifier.

use serde::Deserialize;

use crate::errors::ParseError;

/// Device identifier used when the payload does not carry one.
const DEFAULT_DEVICE_ID: &str = "esp32_device";

const TEXT_PREFIX: &str = "Temperature: ";
const TEXT_SUFFIX: &str = " C";

/// One decoded device packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub device: String,
    pub temperature: f64,
    /// Device-side clock reading, if the packet carried one.
    pub timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct JsonReport {
    device: Option<String>,
    #[serde(alias = "temp")]
    temperature: f64,
    timestamp: Option<i64>,
}

/// Decode one datagram payload into a [`DeviceReport`].
pub fn parse(payload: &[u8]) -> Result<DeviceReport, ParseError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| ParseError::NotUtf8)?
        .trim();

    let report = if text.starts_with('{') {
        let json: JsonReport = serde_json::from_str(text)
            .map_err(|_| ParseError::UnrecognizedFormat(text.to_string()))?;
        DeviceReport {
            device: json
                .device
                .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
            temperature: json.temperature,
            timestamp: json.timestamp,
        }
    } else {
        let temperature = text
            .strip_prefix(TEXT_PREFIX)
            .and_then(|rest| rest.strip_suffix(TEXT_SUFFIX))
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| ParseError::UnrecognizedFormat(text.to_string()))?;
        DeviceReport {
            device: DEFAULT_DEVICE_ID.to_string(),
            temperature,
            timestamp: None,
        }
    };

    if !report.temperature.is_finite() {
        return Err(ParseError::NonFiniteValue);
    }
    Ok(report)
}
