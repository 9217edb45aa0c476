// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Datagram listener for embedded-device telemetry.
//!
//! Binds a UDP socket, decodes each packet into a temperature sample, and
//! forwards it into the delivery queue. Packets are handled one at a time,
//! so arrival order is preserved into the queue. No deduplication happens
//! here: duplicate or out-of-order packets are forwarded as-is.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::metric::{now_timestamp, MetricSample, SampleSource};
use crate::payload;
use crate::queue::DeliveryQueue;

// Device firmware emits single small records; 1 KiB covers every format.
const BUFFER_SIZE: usize = 1024;

const TEMPERATURE_METRIC: &str = "temperature";
const TEMPERATURE_UNIT: &str = "celsius";

/// Configuration for the datagram listener.
pub struct DatagramListenerConfig {
    /// Host to bind the UDP socket to (e.g., "0.0.0.0").
    pub host: String,
    /// Port to bind the UDP socket to (e.g., 12345).
    pub port: u16,
    /// Use the device-side timestamp when a packet carries one. Device
    /// clocks are untrusted by default, so receipt time is used instead.
    pub trust_device_timestamp: bool,
}

// PacketReader abstracts the transport so tests can replay a fixed packet.
enum PacketReader {
    UdpSocket(tokio::net::UdpSocket),

    /// Mirror reader for testing - replays a fixed packet
    #[allow(dead_code)]
    MirrorTest(Vec<u8>, SocketAddr),
}

impl PacketReader {
    /// Blocks until a packet arrives.
    async fn read(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        match self {
            PacketReader::UdpSocket(socket) => {
                let mut buf = [0; BUFFER_SIZE];
                let (amt, src) = socket.recv_from(&mut buf).await?;
                Ok((buf[..amt].to_owned(), src))
            }
            PacketReader::MirrorTest(data, addr) => Ok((data.clone(), *addr)),
        }
    }
}

/// UDP server receiving, decoding, and enqueueing device telemetry.
pub struct DatagramListener {
    cancel_token: tokio_util::sync::CancellationToken,
    queue: Arc<DeliveryQueue>,
    reader: PacketReader,
    trust_device_timestamp: bool,
}

impl DatagramListener {
    /// Binds the UDP socket. A bind failure means nothing downstream can
    /// receive device telemetry, so the error is returned for the caller
    /// to treat as fatal.
    pub async fn bind(
        config: &DatagramListenerConfig,
        queue: Arc<DeliveryQueue>,
        cancel_token: tokio_util::sync::CancellationToken,
    ) -> io::Result<DatagramListener> {
        let addr = format!("{}:{}", config.host, config.port);
        let socket = tokio::net::UdpSocket::bind(&addr).await?;

        Ok(DatagramListener {
            cancel_token,
            queue,
            reader: PacketReader::UdpSocket(socket),
            trust_device_timestamp: config.trust_device_timestamp,
        })
    }

    /// Main receive loop. Each packet is fully handled before the next
    /// receive; exits when the cancellation token fires.
    pub async fn spin(self) {
        loop {
            tokio::select! {
                () = self.consume_packet() => {}
                () = self.cancel_token.cancelled() => break,
            }
        }
        debug!("datagram listener stopped");
    }

    /// Receive one packet, decode it, and enqueue the resulting sample.
    async fn consume_packet(&self) {
        let (buf, src) = match self.reader.read().await {
            Ok(received) => received,
            Err(e) => {
                warn!("failed to receive datagram: {e}");
                return;
            }
        };
        trace!("received {} bytes from {src}", buf.len());

        match payload::parse(&buf) {
            Ok(report) => {
                let timestamp = match report.timestamp {
                    Some(ts) if self.trust_device_timestamp => ts,
                    _ => now_timestamp(),
                };
                self.queue.push(MetricSample {
                    source: SampleSource::Embedded,
                    metric_name: TEMPERATURE_METRIC.to_string(),
                    value: report.temperature,
                    timestamp,
                    unit: Some(TEMPERATURE_UNIT.to_string()),
                    device: Some(report.device),
                });
            }
            Err(e) => warn!("discarding malformed packet from {src}: {e}"),
        }
    }
}
