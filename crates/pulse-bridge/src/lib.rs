// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pulse Bridge
//!
//! Streams heart-rate notifications from a BLE sensor, relays every reading
//! to a serial peripheral, and stores readings in SQLite in fixed-size
//! batches.
//!
//! # Architecture
//!
//! ```text
//! NotificationSource --> SamplePipeline --+--> Forwarder    (one SEND per sample)
//!                                         +--> BatchBuffer  (bounded, in order)
//!                                                  | full
//!                                                  v
//!                                              FlushSink    (one transaction per batch)
//! ```
//!
//! Forward and flush failures are logged and counted; only a source failure
//! ends the run.
//!
//! # Example
//!
//! ```ignore
//! use pulse_bridge::{Config, MockSource, NullForwarder, SamplePipeline, SqliteSink};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::builder().batch_capacity(10).build();
//! let sink = SqliteSink::new(&config.database, &config.table)?;
//! let mut pipeline = SamplePipeline::new(NullForwarder, sink, config.batch_capacity);
//!
//! let mut source = MockSource::new(std::time::Duration::from_secs(1));
//! pipeline.run(&mut source, &CancellationToken::new()).await?;
//! ```

#[cfg(feature = "ble")]
pub mod ble;
pub mod buffer;
pub mod config;
pub mod forwarder;
pub mod pipeline;
pub mod sample;
pub mod sink;
pub mod source;
pub mod sqlite;

#[cfg(feature = "ble")]
pub use ble::BleSource;
pub use buffer::BatchBuffer;
pub use config::{Config, ConfigBuilder, ConfigError};
pub use forwarder::{ForwardError, Forwarder, NullForwarder, SerialForwarder};
pub use pipeline::{PipelineStats, SamplePipeline};
pub use sample::{decode_value, DecodeError, Sample};
pub use sink::{FlushError, FlushSink};
pub use source::{ChannelSource, MockSource, NotificationSource, SourceError};
pub use sqlite::SqliteSink;
