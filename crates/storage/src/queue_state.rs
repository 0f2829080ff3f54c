// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue snapshot persistence for crash recovery.
//!
//! The snapshot is the complete durable image of the notification queue:
//! both priority lists in FIFO order, the id counter, and the drain/flush
//! stamps. Writes go to a `.tmp` sibling, fsync, then rename over the
//! live file so a crash mid-write cannot tear the on-disk image.

use crate::StoreError;
use chrono::{DateTime, Utc};
use magpie_core::Job;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Durable image of the notification queue.
///
/// Unknown fields are ignored on read; a missing file loads as the empty
/// default. All times are UTC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Next job id to assign; always greater than every stored job id.
    #[serde(default)]
    pub next_id: i64,
    #[serde(default)]
    pub urgent: Vec<Job>,
    #[serde(default)]
    pub regular: Vec<Job>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_flush_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_regular_drain_at: Option<DateTime<Utc>>,
}

impl QueueSnapshot {
    /// Highest job id present in either list, or 0 when empty.
    pub fn max_job_id(&self) -> i64 {
        self.urgent
            .iter()
            .chain(self.regular.iter())
            .map(|job| job.id)
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.urgent.is_empty() && self.regular.is_empty()
    }
}

/// Atomic reader/writer for the queue snapshot file.
#[derive(Debug, Clone)]
pub struct QueueStateFile {
    path: PathBuf,
}

impl QueueStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot.
    ///
    /// A missing file yields the empty default. A corrupt file is moved
    /// to a `.bak` sibling (up to three rotated backups kept) and also
    /// yields the default, so a damaged snapshot never wedges startup.
    pub fn load(&self) -> Result<QueueSnapshot, StoreError> {
        if !self.path.exists() {
            return Ok(QueueSnapshot::default());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                let bak_path = rotate_bak_path(&self.path);
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    bak = %bak_path.display(),
                    "Corrupt queue snapshot, moving to .bak and starting empty",
                );
                fs::rename(&self.path, &bak_path)?;
                Ok(QueueSnapshot::default())
            }
        }
    }

    /// Save the snapshot atomically (write to `.tmp`, fsync, rename).
    pub fn save(&self, snapshot: &QueueSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");

        // Write to temp file and sync
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, snapshot)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        // Atomic rename
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    // Remove the oldest if at capacity
    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    // Shift existing backups up by one
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "queue_state_tests.rs"]
mod tests;
