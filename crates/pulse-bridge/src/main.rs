// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pulse Bridge CLI
//!
//! Relays heart-rate readings to a serial peripheral and stores them in
//! SQLite batches.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the sensor (needs the `ble` feature)
//! pulse-bridge --device E8:78:20:78:84:EC --serial-port /dev/ttyACM0
//!
//! # Load settings from YAML, override the batch size
//! pulse-bridge --config bridge.yaml --batch-capacity 20
//!
//! # Synthetic readings, no peripheral
//! pulse-bridge --mock --db /tmp/hr.db
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use pulse_bridge::{
    Config, ConfigBuilder, Forwarder, MockSource, NotificationSource, NullForwarder,
    SamplePipeline, SerialForwarder, SqliteSink,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "pulse-bridge")]
#[command(about = "Pulse Bridge - BLE heart-rate relay with batched SQLite storage", long_about = None)]
struct Args {
    /// YAML configuration file (CLI flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sensor BLE address
    #[arg(long)]
    device: Option<String>,

    /// Notifying characteristic (16-bit UUID, e.g. 0x2A37)
    #[arg(long, value_parser = parse_uuid16)]
    characteristic: Option<u16>,

    /// Serial device of the peripheral
    #[arg(short, long)]
    serial_port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud_rate: Option<u32>,

    /// Acknowledgement read timeout in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Database path (SQLite file)
    #[arg(short, long)]
    db: Option<String>,

    /// Destination table
    #[arg(long)]
    table: Option<String>,

    /// Samples per stored batch
    #[arg(long)]
    batch_capacity: Option<usize>,

    /// Use synthetic readings and skip the serial peripheral
    #[arg(long)]
    mock: bool,

    /// Interval between synthetic readings in milliseconds
    #[arg(long, default_value_t = 1000)]
    mock_interval_ms: u64,

    /// BLE scan timeout in seconds
    #[arg(long, default_value_t = 10)]
    scan_timeout: u64,
}

fn parse_uuid16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid 16-bit UUID {:?}: {}", s, e))
}

fn load_config(args: &Args) -> Result<Config> {
    let base = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(device) = &args.device {
        builder = builder.device_address(device);
    }
    if let Some(uuid) = args.characteristic {
        builder = builder.characteristic_uuid(uuid);
    }
    if let Some(port) = &args.serial_port {
        builder = builder.serial_port(port);
    }
    if let Some(baud) = args.baud_rate {
        builder = builder.baud_rate(baud);
    }
    if let Some(ms) = args.read_timeout_ms {
        builder = builder.read_timeout_ms(ms);
    }
    if let Some(db) = &args.db {
        builder = builder.database(db);
    }
    if let Some(table) = &args.table {
        builder = builder.table(table);
    }
    if let Some(capacity) = args.batch_capacity {
        builder = builder.batch_capacity(capacity);
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    tracing::info!("Pulse Bridge starting...");
    tracing::info!("  Database: {} (table {})", config.database, config.table);
    tracing::info!("  Batch capacity: {}", config.batch_capacity);

    let sink = SqliteSink::new(&config.database, &config.table)
        .with_context(|| format!("Failed to prepare database {}", config.database))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    if args.mock {
        tracing::info!("Running with synthetic readings every {} ms", args.mock_interval_ms);
        let mut source = MockSource::new(Duration::from_millis(args.mock_interval_ms));
        return run_pipeline(NullForwarder, sink, &config, &mut source, &shutdown).await;
    }

    tracing::info!("  Peripheral: {} @ {} baud", config.serial_port, config.baud_rate);
    let forwarder =
        SerialForwarder::new(&config.serial_port, config.baud_rate, config.read_timeout());

    run_ble(forwarder, sink, &config, &shutdown, Duration::from_secs(args.scan_timeout)).await
}

#[cfg(feature = "ble")]
async fn run_ble(
    forwarder: SerialForwarder,
    sink: SqliteSink,
    config: &Config,
    shutdown: &CancellationToken,
    scan_timeout: Duration,
) -> Result<()> {
    tracing::info!(
        "  Sensor: {} (characteristic {:#06x})",
        config.device_address,
        config.characteristic_uuid
    );
    let mut source = pulse_bridge::BleSource::connect(
        &config.device_address,
        config.characteristic_uuid,
        scan_timeout,
    )
    .await
    .context("BLE connection failed")?;

    let result = run_pipeline(forwarder, sink, config, &mut source, shutdown).await;
    source.disconnect().await;
    result
}

#[cfg(not(feature = "ble"))]
async fn run_ble(
    _forwarder: SerialForwarder,
    _sink: SqliteSink,
    _config: &Config,
    _shutdown: &CancellationToken,
    _scan_timeout: Duration,
) -> Result<()> {
    anyhow::bail!("built without BLE support; rebuild with `--features ble` or pass --mock")
}

async fn run_pipeline<F, N>(
    forwarder: F,
    sink: SqliteSink,
    config: &Config,
    source: &mut N,
    shutdown: &CancellationToken,
) -> Result<()>
where
    F: Forwarder,
    N: NotificationSource,
{
    let mut pipeline = SamplePipeline::new(forwarder, sink, config.batch_capacity);
    let result = pipeline.run(source, shutdown).await;

    let stats = pipeline.stats();
    tracing::info!(
        "Received {} notifications: {} forwarded ({} failed), {} rows in {} batches",
        stats.notifications,
        stats.forwarded,
        stats.forward_errors,
        stats.rows_written,
        stats.batches_flushed
    );
    if stats.flush_errors > 0 {
        tracing::warn!(
            "{} batches failed to store, {} samples lost",
            stats.flush_errors,
            stats.samples_lost
        );
    }
    if !pipeline.buffer().is_empty() {
        tracing::info!("{} samples were still buffered", pipeline.buffer().len());
    }

    result.context("Notification source failed")
}
