// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only log of terminally failed jobs.
//!
//! Each record is a single line of JSON: `{"job":{...},"failed_at":...,
//! "error":"..."}\n`. Records are never removed by the pipeline;
//! truncation is an operator action.

use crate::StoreError;
use chrono::{DateTime, Utc};
use magpie_core::Job;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One terminal failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub job: Job,
    pub failed_at: DateTime<Utc>,
    pub error: String,
}

/// Appender/reader for the failed-job log.
#[derive(Debug, Clone)]
pub struct FailedStore {
    path: PathBuf,
}

impl FailedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and sync it to disk.
    pub fn append(&self, record: &FailedRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every record in append order.
    ///
    /// A missing file yields an empty list. Unparseable lines are skipped
    /// with a warning rather than failing the read; the log is diagnostic
    /// data, not a source of truth.
    pub fn read_all(&self) -> Result<Vec<FailedRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "Skipping corrupt failed-log line",
                ),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
#[path = "failed_tests.rs"]
mod tests;
