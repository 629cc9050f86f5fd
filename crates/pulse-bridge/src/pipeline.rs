// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample pipeline
//!
//! Handles every notification to completion before the next one is read:
//!
//! 1. Decode the payload and stamp the capture time
//! 2. Forward the value to the peripheral (failure is logged, not fatal)
//! 3. Append the sample to the batch buffer
//! 4. When the buffer is full, drain it and flush the batch to the sink
//!
//! A failed flush drops the drained batch. The buffer is empty after every
//! drain, so the pipeline never gets stuck full.

use crate::buffer::BatchBuffer;
use crate::forwarder::Forwarder;
use crate::sample::{decode_value, Sample};
use crate::sink::FlushSink;
use crate::source::{NotificationSource, SourceError};
use tokio_util::sync::CancellationToken;

/// Pipeline statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Notifications handed to the pipeline
    pub notifications: u64,
    /// Notifications whose payload could not be decoded
    pub decode_errors: u64,
    /// Values the peripheral accepted
    pub forwarded: u64,
    /// Values that could not be forwarded
    pub forward_errors: u64,
    /// Batches committed to storage
    pub batches_flushed: u64,
    /// Rows committed to storage
    pub rows_written: u64,
    /// Batches the sink rejected
    pub flush_errors: u64,
    /// Samples dropped along with a rejected batch
    pub samples_lost: u64,
}

/// Per-sample orchestrator owning the batch buffer.
pub struct SamplePipeline<F: Forwarder, S: FlushSink> {
    forwarder: F,
    sink: S,
    buffer: BatchBuffer,
    stats: PipelineStats,
}

impl<F: Forwarder, S: FlushSink> SamplePipeline<F, S> {
    /// Create a pipeline flushing every `capacity` samples.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(forwarder: F, sink: S, capacity: usize) -> Self {
        Self {
            forwarder,
            sink,
            buffer: BatchBuffer::new(capacity),
            stats: PipelineStats::default(),
        }
    }

    /// Get pipeline statistics
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Samples waiting for the next flush.
    pub fn buffer(&self) -> &BatchBuffer {
        &self.buffer
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until the source ends, fails, or `shutdown` is cancelled.
    ///
    /// Cancellation only interrupts the wait for the next notification; a
    /// sample already being handled is finished first. Buffered samples stay
    /// in the pipeline when this returns.
    pub async fn run<N: NotificationSource>(
        &mut self,
        source: &mut N,
        shutdown: &CancellationToken,
    ) -> Result<(), SourceError> {
        tracing::info!(
            "Sample pipeline started (batch capacity {})",
            self.buffer.capacity()
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!(
                        "Shutdown requested, {} samples left unflushed",
                        self.buffer.len()
                    );
                    return Ok(());
                }

                next = source.next_notification() => match next {
                    Ok(Some(raw)) => self.on_sample(&raw).await,
                    Ok(None) => {
                        tracing::info!("Notification source finished");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::error!("Notification source failed: {}", e);
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Handle one raw notification payload.
    pub async fn on_sample(&mut self, raw: &[u8]) {
        self.stats.notifications += 1;

        let value = match decode_value(raw) {
            Ok(value) => value,
            Err(e) => {
                self.stats.decode_errors += 1;
                tracing::warn!("Dropping notification: {}", e);
                return;
            }
        };

        self.accept(Sample::now(value)).await;
    }

    /// Forward, buffer and, when the buffer fills, flush one sample.
    pub async fn accept(&mut self, sample: Sample) {
        tracing::debug!("Sample {} at {}", sample.value, sample.captured_at);

        match self.forwarder.forward(sample.value).await {
            Ok(()) => self.stats.forwarded += 1,
            Err(e) => {
                self.stats.forward_errors += 1;
                tracing::warn!("Failed to forward {}: {}", sample.value, e);
            }
        }

        self.buffer.append(sample);
        if self.buffer.is_full() {
            self.flush_batch();
        }
    }

    fn flush_batch(&mut self) {
        let batch = self.buffer.drain_all();

        match self.sink.flush(&batch) {
            Ok(rows) => {
                self.stats.batches_flushed += 1;
                self.stats.rows_written += rows as u64;
                tracing::info!("{} rows written to storage", rows);
            }
            Err(e) => {
                self.stats.flush_errors += 1;
                self.stats.samples_lost += batch.len() as u64;
                tracing::error!("Failed to store batch of {} samples: {}", batch.len(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::NullForwarder;
    use crate::sink::FlushError;
    use crate::source::ChannelSource;
    use chrono::Utc;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingSink {
        batches: Vec<usize>,
    }

    impl FlushSink for CountingSink {
        fn flush(&mut self, records: &[Sample]) -> Result<usize, FlushError> {
            self.batches.push(records.len());
            Ok(records.len())
        }
    }

    #[tokio::test]
    async fn test_buffer_fills_then_resets() {
        let mut pipeline = SamplePipeline::new(NullForwarder, CountingSink::default(), 3);

        pipeline.on_sample(&[60]).await;
        pipeline.on_sample(&[61]).await;
        assert_eq!(pipeline.buffer().len(), 2);
        assert!(pipeline.sink().batches.is_empty());

        pipeline.on_sample(&[62]).await;
        assert!(pipeline.buffer().is_empty());
        assert_eq!(pipeline.sink().batches, vec![3]);
        assert_eq!(pipeline.stats().rows_written, 3);
        assert_eq!(pipeline.stats().forwarded, 3);
    }

    /// Keeps every flushed sample, timestamps included.
    #[derive(Default)]
    struct KeepingSink {
        stored: Vec<Sample>,
    }

    impl FlushSink for KeepingSink {
        fn flush(&mut self, records: &[Sample]) -> Result<usize, FlushError> {
            self.stored.extend_from_slice(records);
            Ok(records.len())
        }
    }

    #[tokio::test]
    async fn test_capture_time_taken_on_arrival() {
        let mut pipeline = SamplePipeline::new(NullForwarder, KeepingSink::default(), 1);

        let before = Utc::now();
        pipeline.on_sample(&[64]).await;
        let after = Utc::now();

        let stored = &pipeline.sink().stored;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, 64);
        assert!(before <= stored[0].captured_at);
        assert!(stored[0].captured_at <= after);
    }

    #[test]
    #[should_panic(expected = "batch capacity must be at least 1")]
    fn test_zero_capacity_pipeline_rejected() {
        let _ = SamplePipeline::new(NullForwarder, CountingSink::default(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_skipped() {
        let mut pipeline = SamplePipeline::new(NullForwarder, CountingSink::default(), 2);

        pipeline.on_sample(&[]).await;
        pipeline.on_sample(&[1, 2, 3, 4, 5]).await;
        pipeline.on_sample(&[70]).await;

        assert_eq!(pipeline.stats().notifications, 3);
        assert_eq!(pipeline.stats().decode_errors, 2);
        assert_eq!(pipeline.stats().forwarded, 1);
        assert_eq!(pipeline.buffer().len(), 1);
    }

    #[tokio::test]
    async fn test_run_until_source_ends() {
        let (mut source, tx) = ChannelSource::new(16);
        for v in [70u8, 72, 74, 76, 78] {
            tx.send(vec![v]).await.unwrap();
        }
        drop(tx);

        let mut pipeline = SamplePipeline::new(NullForwarder, CountingSink::default(), 2);
        let shutdown = CancellationToken::new();
        pipeline.run(&mut source, &shutdown).await.unwrap();

        assert_eq!(pipeline.sink().batches, vec![2, 2]);
        assert_eq!(pipeline.buffer().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_keeps_buffered_samples() {
        let (mut source, tx) = ChannelSource::new(16);
        tx.send(vec![80]).await.unwrap();

        let mut pipeline = SamplePipeline::new(NullForwarder, CountingSink::default(), 10);
        let shutdown = CancellationToken::new();

        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown.cancel();
            })
        };

        pipeline.run(&mut source, &shutdown).await.unwrap();
        canceller.await.unwrap();

        // Sender still alive: only the cancellation could have ended the run.
        assert!(!tx.is_closed());
        assert_eq!(pipeline.buffer().len(), 1);
        assert!(pipeline.sink().batches.is_empty());
    }
}
