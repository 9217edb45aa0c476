// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};

use telemetry_core::{
    collector::{Collector, ProcCounterReader},
    config::Config,
    intake::IntakeClient,
    listener::{DatagramListener, DatagramListenerConfig},
    queue::DeliveryQueue,
    uploader::{Uploader, UploaderConfig},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("TELEMETRY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on telemetry agent startup: {e}");
            return;
        }
    };

    let queue = Arc::new(DeliveryQueue::new(config.queue_capacity));
    let cancel_token = CancellationToken::new();

    let listener_config = DatagramListenerConfig {
        host: config.listen_host.clone(),
        port: config.listen_port,
        trust_device_timestamp: config.trust_device_timestamp,
    };
    let listener = match DatagramListener::bind(
        &listener_config,
        Arc::clone(&queue),
        cancel_token.clone(),
    )
    .await
    {
        Ok(listener) => listener,
        Err(e) => {
            error!(
                "Failed to bind datagram listener on {}:{}: {e}. Shutting down.",
                config.listen_host, config.listen_port
            );
            return;
        }
    };
    info!(
        "datagram listener: listening on {}:{}",
        config.listen_host, config.listen_port
    );
    tokio::spawn(listener.spin());

    let collector = Collector::new(
        Arc::clone(&queue),
        Box::new(ProcCounterReader),
        config.metrics.clone(),
        config.sample_interval,
    );
    tokio::spawn(collector.run(cancel_token.clone()));
    debug!("collector sampling every {:?}", config.sample_interval);

    let client = IntakeClient::new(config.intake_url.clone(), config.flush_timeout);
    let uploader = Uploader::new(
        Arc::clone(&queue),
        client,
        UploaderConfig {
            upload_interval: config.upload_interval,
            max_batch_size: config.max_batch_size,
            max_retries: config.max_retries,
            retry_backoff_base: config.retry_backoff_base,
            retry_backoff_ceiling: config.retry_backoff_ceiling,
            shutdown_timeout: config.shutdown_timeout,
        },
    );
    let uploader_task = tokio::spawn(uploader.run(cancel_token.clone()));
    info!("uploading to {} every {:?}", config.intake_url, config.upload_interval);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("shutdown signal received");
    cancel_token.cancel();

    // the uploader performs the final bounded drain-and-flush before exiting
    let _ = uploader_task.await;
}
