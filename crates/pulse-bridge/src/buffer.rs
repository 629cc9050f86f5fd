// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded batch buffer for decoded samples.
//!
//! Accumulates samples in arrival order until `capacity` is reached, then
//! hands the whole batch back in one move.

use crate::sample::Sample;

/// A bounded, append-only buffer of samples.
///
/// The buffer never re-orders its contents: [`BatchBuffer::drain_all`]
/// yields samples exactly as they were appended.
#[derive(Debug)]
pub struct BatchBuffer {
    samples: Vec<Sample>,
    capacity: usize,
}

impl BatchBuffer {
    /// Create a new batch buffer holding at most `capacity` samples.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "batch capacity must be at least 1");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample and return the new length.
    pub fn append(&mut self, sample: Sample) -> usize {
        self.samples.push(sample);
        self.samples.len()
    }

    /// True once the buffer holds `capacity` samples.
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Take every buffered sample, leaving the buffer empty.
    pub fn drain_all(&mut self) -> Vec<Sample> {
        std::mem::replace(&mut self.samples, Vec::with_capacity(self.capacity))
    }

    /// Get the current number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured flush threshold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
