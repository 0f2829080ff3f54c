// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prepared-sender adapters

mod noop;
mod traced;

pub use noop::NoopSender;
pub use traced::TracedSender;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSender, SendCall};

use async_trait::async_trait;
use magpie_core::Job;
use std::time::Duration;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered (or absorbed as a duplicate by the transport).
    Ok,
    /// Transient failure; the queue may retry. `retry_after` carries a
    /// flood-wait hint from the transport that overrides backoff.
    Retryable {
        reason: String,
        retry_after: Option<Duration>,
    },
    /// Permanent failure; the job goes to the failed store.
    Terminal { reason: String },
}

impl SendOutcome {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn terminal(reason: impl Into<String>) -> Self {
        Self::Terminal {
            reason: reason.into(),
        }
    }
}

/// Adapter mapping a [`Job`] onto a concrete transport call.
///
/// `idempotency_key` is deterministic per job, so a de-duplicating
/// transport (Telegram's `random_id`) absorbs retried sends. Must be
/// safe for concurrent use; send futures must return promptly when the
/// surrounding task is cancelled.
#[async_trait]
pub trait PreparedSender: Clone + Send + Sync + 'static {
    async fn send(&self, job: &Job, idempotency_key: i64) -> SendOutcome;
}
