// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Notification source abstraction
//!
//! A source yields raw notification payloads one at a time. The pipeline
//! does not care whether they come from a BLE link, a channel, or a
//! generator.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Source-level errors. Fatal to the run loop.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),

    #[error("no adapter available")]
    NoAdapter,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("characteristic {0:#06x} not found on device")]
    CharacteristicNotFound(u16),

    #[error("link error: {0}")]
    Link(String),

    #[error("notification stream ended unexpectedly")]
    Disconnected,
}

/// Yields raw notification payloads.
#[async_trait]
pub trait NotificationSource: Send {
    /// Wait for the next payload.
    ///
    /// `Ok(None)` means the source finished cleanly and no more payloads
    /// will arrive.
    async fn next_notification(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

// ============================================================================
// Channel source
// ============================================================================

/// Source fed through an mpsc channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    /// Create a new channel source
    ///
    /// Returns the source and a sender for pushing payloads. Dropping every
    /// sender ends the source.
    pub fn new(depth: usize) -> (Self, mpsc::Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { rx }, tx)
    }
}

#[async_trait]
impl NotificationSource for ChannelSource {
    async fn next_notification(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self.rx.recv().await)
    }
}

// ============================================================================
// Mock source
// ============================================================================

/// Synthetic heart-rate source
///
/// Emits 2-byte little-endian readings between 60 and 100 bpm on a fixed
/// period, forever or until `limit` payloads have been produced.
pub struct MockSource {
    ticker: Interval,
    emitted: u64,
    limit: Option<u64>,
}

impl MockSource {
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            emitted: 0,
            limit: None,
        }
    }

    /// Stop after `limit` payloads.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reading emitted for the `n`-th payload.
    pub fn reading(n: u64) -> u16 {
        60 + ((n * 7) % 41) as u16
    }
}

#[async_trait]
impl NotificationSource for MockSource {
    async fn next_notification(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return Ok(None);
        }

        self.ticker.tick().await;
        let reading = Self::reading(self.emitted);
        self.emitted += 1;
        Ok(Some(reading.to_le_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::decode_value;

    #[tokio::test]
    async fn test_channel_source_delivers_in_order() {
        let (mut source, tx) = ChannelSource::new(8);

        tx.send(vec![60]).await.unwrap();
        tx.send(vec![62]).await.unwrap();
        drop(tx);

        assert_eq!(source.next_notification().await.unwrap(), Some(vec![60]));
        assert_eq!(source.next_notification().await.unwrap(), Some(vec![62]));
        assert_eq!(source.next_notification().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_source_respects_limit() {
        let mut source = MockSource::new(Duration::from_millis(1)).with_limit(3);

        let mut values = Vec::new();
        while let Some(raw) = source.next_notification().await.unwrap() {
            assert_eq!(raw.len(), 2);
            values.push(decode_value(&raw).unwrap());
        }

        assert_eq!(values, vec![60, 67, 74]);
    }

    #[test]
    fn test_mock_readings_stay_in_range() {
        for n in 0..500 {
            let r = MockSource::reading(n);
            assert!((60..=100).contains(&r), "reading {} out of range", r);
        }
    }
}
