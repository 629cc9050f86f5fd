// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SQLite flush sink
//!
//! Writes each drained batch inside a single transaction.

use crate::config::is_sql_identifier;
use crate::sample::Sample;
use crate::sink::{FlushError, FlushSink};
use chrono::SecondsFormat;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQLite flush sink
///
/// Holds only the database path; a connection is opened for every flush and
/// dropped when the flush returns, whatever the outcome.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE heart_rate (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     timestamp TEXT NOT NULL,
///     value INTEGER NOT NULL
/// );
/// ```
pub struct SqliteSink {
    path: PathBuf,
    table: String,
    insert_sql: String,
}

impl SqliteSink {
    /// Create a sink writing to `table` in the database at `path`.
    ///
    /// The table is created if it does not exist yet.
    pub fn new(path: impl AsRef<Path>, table: &str) -> Result<Self, FlushError> {
        if !is_sql_identifier(table) {
            return Err(FlushError::Other(format!("invalid table name: {:?}", table)));
        }

        let sink = Self {
            path: path.as_ref().to_path_buf(),
            table: table.to_string(),
            insert_sql: format!("INSERT INTO {} (timestamp, value) VALUES (?1, ?2)", table),
        };
        sink.init_schema()?;
        Ok(sink)
    }

    /// Total number of rows stored in the table.
    pub fn count(&self) -> Result<usize, FlushError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
            row.get(0)
        })?;

        Ok(count as usize)
    }

    fn connect(&self) -> Result<Connection, FlushError> {
        Connection::open(&self.path).map_err(|source| FlushError::Connect {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn init_schema(&self) -> Result<(), FlushError> {
        let conn = self.connect()?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL,
                    value INTEGER NOT NULL
                )",
                self.table
            ),
            [],
        )?;

        Ok(())
    }
}

impl FlushSink for SqliteSink {
    fn flush(&mut self, records: &[Sample]) -> Result<usize, FlushError> {
        if records.is_empty() {
            return Err(FlushError::EmptyBatch);
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut rows = 0;
        {
            let mut insert = tx.prepare(&self.insert_sql)?;
            for sample in records {
                rows += insert.execute(params![
                    sample.captured_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                    sample.value,
                ])?;
            }
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit()?;

        tracing::trace!("Committed {} rows to {}", rows, self.table);
        Ok(rows)
    }
}
