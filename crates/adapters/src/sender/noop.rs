// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op prepared sender.

use super::{PreparedSender, SendOutcome};
use async_trait::async_trait;
use magpie_core::Job;

/// Sender that silently discards every job.
///
/// Used when delivery is disabled or not yet configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSender;

impl NoopSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PreparedSender for NoopSender {
    async fn send(&self, _job: &Job, _idempotency_key: i64) -> SendOutcome {
        SendOutcome::Ok
    }
}
