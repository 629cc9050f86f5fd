// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// BLE address of the sensor (e.g. "E8:78:20:78:84:EC")
    pub device_address: String,

    /// 16-bit GATT characteristic carrying the readings
    pub characteristic_uuid: u16,

    /// Serial device of the actuating peripheral
    pub serial_port: String,

    /// Serial baud rate
    pub baud_rate: u32,

    /// How long the forwarder waits for another acknowledgement line
    pub read_timeout_ms: u64,

    /// SQLite database path
    pub database: String,

    /// Table receiving flushed batches
    pub table: String,

    /// Samples per flushed batch
    pub batch_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_address: "E8:78:20:78:84:EC".to_string(),
            characteristic_uuid: 0x2A37,
            serial_port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 1000,
            database: "heart_rate.db".to_string(),
            table: "heart_rate".to_string(),
            batch_capacity: 10,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse configuration from a YAML string.
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check values that would otherwise fail deep inside the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_capacity == 0 {
            return Err(ConfigError::Invalid(
                "batch_capacity must be at least 1".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be non-zero".to_string()));
        }
        if self.serial_port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial_port is empty".to_string()));
        }
        if !is_sql_identifier(&self.table) {
            return Err(ConfigError::Invalid(format!(
                "table {:?} is not a plain SQL identifier",
                self.table
            )));
        }
        Ok(())
    }

    /// Forwarder read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Letters, digits and underscores, not starting with a digit.
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Config builder for fluent API
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    device_address: Option<String>,
    characteristic_uuid: Option<u16>,
    serial_port: Option<String>,
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    database: Option<String>,
    table: Option<String>,
    batch_capacity: Option<usize>,
}

impl ConfigBuilder {
    /// Start from an existing configuration instead of the defaults
    pub fn from_config(config: Config) -> Self {
        Self {
            device_address: Some(config.device_address),
            characteristic_uuid: Some(config.characteristic_uuid),
            serial_port: Some(config.serial_port),
            baud_rate: Some(config.baud_rate),
            read_timeout_ms: Some(config.read_timeout_ms),
            database: Some(config.database),
            table: Some(config.table),
            batch_capacity: Some(config.batch_capacity),
        }
    }

    /// Set the sensor's BLE address
    pub fn device_address(mut self, address: impl Into<String>) -> Self {
        self.device_address = Some(address.into());
        self
    }

    /// Set the notifying characteristic
    pub fn characteristic_uuid(mut self, uuid: u16) -> Self {
        self.characteristic_uuid = Some(uuid);
        self
    }

    /// Set the peripheral's serial device
    pub fn serial_port(mut self, port: impl Into<String>) -> Self {
        self.serial_port = Some(port.into());
        self
    }

    /// Set the serial baud rate
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Set the acknowledgement read timeout in milliseconds
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.read_timeout_ms = Some(ms);
        self
    }

    /// Set the SQLite database path
    pub fn database(mut self, path: impl Into<String>) -> Self {
        self.database = Some(path.into());
        self
    }

    /// Set the destination table
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the number of samples per batch
    pub fn batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = Some(capacity);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        let defaults = Config::default();

        Config {
            device_address: self.device_address.unwrap_or(defaults.device_address),
            characteristic_uuid: self
                .characteristic_uuid
                .unwrap_or(defaults.characteristic_uuid),
            serial_port: self.serial_port.unwrap_or(defaults.serial_port),
            baud_rate: self.baud_rate.unwrap_or(defaults.baud_rate),
            read_timeout_ms: self.read_timeout_ms.unwrap_or(defaults.read_timeout_ms),
            database: self.database.unwrap_or(defaults.database),
            table: self.table.unwrap_or(defaults.table),
            batch_capacity: self.batch_capacity.unwrap_or(defaults.batch_capacity),
        }
    }
}
