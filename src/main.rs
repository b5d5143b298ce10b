//! # Rover Base Station
//!
//! Drive a rover with an Xbox controller and an N64-style auxiliary pad over
//! an XBee radio link (or UDP, against a rover simulator).

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use rover_basestation::comms::receiver;
use rover_basestation::config::{Config, LoggingConfig};
use rover_basestation::controller::gamepad;
use rover_basestation::controller::input::QuitReason;
use rover_basestation::link::{transport_from_config, Link};
use rover_basestation::station::BaseStation;
use rover_basestation::telemetry::TelemetryLogger;

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Buffered input events between the gamepad threads and the control loop
const INPUT_CHANNEL_CAPACITY: usize = 256;

/// Buffered decoded messages between the receive task and the control loop
const MESSAGE_CHANNEL_CAPACITY: usize = 64;

/// Console logging, plus a daily rolling file when `[logging].directory` is set
///
/// The returned guard must be held for the life of the program so buffered
/// file output is flushed on exit.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "basestation.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Main entry point for the base station
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first CLI argument, or `config/default.toml`)
///    - Set up logging
///    - Open the link; on failure keep running without one
///    - Start the gamepad reader threads and the receive task
///
/// 2. **Main Loop** (every `update_interval_ms`)
///    - Apply queued input events
///    - Send the controller frame if it changed, then a heartbeat if due
///    - Log received telemetry
///    - Log a status line every `status_log_interval_s`
///
/// 3. **Shutdown** (quit button, controller unplugged, or Ctrl+C)
///    - Send the quit frame once
///    - Close the link
///
/// # Errors
///
/// Returns error if the configuration file exists but is invalid
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Invalid configuration in {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("Rover base station v{} starting...", env!("CARGO_PKG_VERSION"));
    if Path::new(&config_path).exists() {
        info!("Configuration loaded from {}", config_path);
    } else {
        warn!("Config file {} not found, using defaults", config_path);
    }

    let transport = transport_from_config(&config)?;
    let mut station = BaseStation::new(&config, Link::new(transport));
    station.open().await;

    // Input: one reader thread per matched gamepad, plus the hotplug watcher.
    // The readers own every sender, so the channel closes if they all stop.
    let (input_tx, mut input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    match gamepad::spawn_readers(&config.input, input_tx) {
        Ok(0) => warn!(
            "No controller found. Sending neutral controls until one is connected"
        ),
        Ok(count) => info!("Reading {} controller(s)", count),
        Err(e) => warn!("Controller input unavailable: {}", e),
    }

    // Inbound: decoded rover messages
    let (message_tx, mut message_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
    let receive_task = station.take_receiver().map(|source| {
        receiver::spawn(source, receiver::inbound_codec(), station.link_stats(), message_tx)
    });

    let mut telemetry = if config.telemetry.enabled {
        match TelemetryLogger::new(&config.telemetry) {
            Ok(logger) => Some(logger),
            Err(e) => {
                warn!("Telemetry logging disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut update_interval = interval(Duration::from_millis(config.timing.update_interval_ms));
    update_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let status_period = Duration::from_secs(config.timing.status_log_interval_s);
    let mut status_interval =
        tokio::time::interval_at(tokio::time::Instant::now() + status_period, status_period);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        "Control loop running every {}ms. Press HOME (Xbox), START (N64) or Ctrl+C to exit",
        config.timing.update_interval_ms
    );

    while !station.should_quit() {
        tokio::select! {
            _ = update_interval.tick() => {
                station.tick(&mut input_rx).await;
            }

            Some(message) = message_rx.recv() => {
                match telemetry.as_mut() {
                    Some(logger) => {
                        if let Err(e) = logger.log(&message) {
                            warn!("Failed to write telemetry: {}", e);
                        }
                    }
                    None => debug!("Received {} message", message.message_type()),
                }
            }

            _ = status_interval.tick() => {
                let stats = station.statistics();
                let modes = station.modes();
                info!(
                    "Sent {} frames ({} failed), received {}, creep={}, reverse={}",
                    stats.sent, stats.send_failures, stats.received, modes.creep, modes.reverse
                );
            }

            // Handle Ctrl+C for graceful shutdown
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down...");
                station.request_quit(QuitReason::Interrupted);
            }
        }
    }

    if let Some(reason) = station.quit_reason() {
        info!("Stopping: {}", reason);
    }
    station.shutdown().await;

    if let Some(handle) = receive_task {
        handle.abort();
    }
    if let Some(logger) = telemetry.as_mut() {
        if let Err(e) = logger.flush() {
            warn!("Failed to flush telemetry log: {}", e);
        }
    }

    Ok(())
}
