// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor samples and notification payload decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Widest payload accepted by [`decode_value`], in bytes.
pub const MAX_PAYLOAD_WIDTH: usize = 4;

/// A single decoded sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Wall-clock time at which the notification was decoded
    pub captured_at: DateTime<Utc>,

    /// Decoded reading
    pub value: u32,
}

impl Sample {
    /// Create a sample captured at `captured_at`.
    pub fn new(captured_at: DateTime<Utc>, value: u32) -> Self {
        Self { captured_at, value }
    }

    /// Create a sample stamped with the current time.
    pub fn now(value: u32) -> Self {
        Self::new(Utc::now(), value)
    }
}

/// Payload decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty notification payload")]
    Empty,

    #[error("notification payload is {0} bytes, at most {} supported", MAX_PAYLOAD_WIDTH)]
    TooWide(usize),
}

/// Decode a little-endian unsigned integer payload.
///
/// Any width from one to [`MAX_PAYLOAD_WIDTH`] bytes is accepted; shorter
/// payloads are zero-extended.
pub fn decode_value(raw: &[u8]) -> Result<u32, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }
    if raw.len() > MAX_PAYLOAD_WIDTH {
        return Err(DecodeError::TooWide(raw.len()));
    }

    let mut bytes = [0u8; MAX_PAYLOAD_WIDTH];
    bytes[..raw.len()].copy_from_slice(raw);
    Ok(u32::from_le_bytes(bytes))
}
