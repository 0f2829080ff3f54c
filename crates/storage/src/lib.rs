// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! magpie-storage: durable state for the notification pipeline
//!
//! Two files back the pipeline across restarts: a queue snapshot written
//! atomically (tmp + fsync + rename) and an append-only JSONL log of
//! terminally failed jobs.

mod failed;
mod queue_state;

pub use failed::{FailedRecord, FailedStore};
pub use queue_state::{QueueSnapshot, QueueStateFile};

use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
