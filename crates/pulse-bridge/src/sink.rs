// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flush sink abstraction
//!
//! Defines the trait for batch storage backends.

use crate::sample::Sample;
use thiserror::Error;

/// Batch persistence errors.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("refusing to flush an empty batch")]
    EmptyBatch,

    #[error("failed to open database {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database write failed: {0}")]
    Write(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

/// Flush sink trait
///
/// Persists a drained batch as one all-or-nothing unit: either every row is
/// committed or none is. Sinks never retry on their own.
///
/// # Implementations
///
/// - `SqliteSink` -- one transaction per batch
pub trait FlushSink {
    /// Persist `records` and return the number of rows written.
    ///
    /// Callers only pass non-empty batches.
    fn flush(&mut self, records: &[Sample]) -> Result<usize, FlushError>;
}
