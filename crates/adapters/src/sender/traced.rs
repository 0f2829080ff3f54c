// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced sender wrapper for consistent observability

use super::{PreparedSender, SendOutcome};
use async_trait::async_trait;
use magpie_core::Job;
use tracing::Instrument;

/// Wrapper that adds tracing to any PreparedSender
#[derive(Clone)]
pub struct TracedSender<S> {
    inner: S,
}

impl<S> TracedSender<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: PreparedSender> PreparedSender for TracedSender<S> {
    async fn send(&self, job: &Job, idempotency_key: i64) -> SendOutcome {
        async {
            let start = std::time::Instant::now();
            let outcome = self.inner.send(job, idempotency_key).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &outcome {
                SendOutcome::Ok => tracing::debug!(elapsed_ms, "sent"),
                SendOutcome::Retryable { reason, retry_after } => tracing::warn!(
                    elapsed_ms,
                    %reason,
                    retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                    "retryable send failure"
                ),
                SendOutcome::Terminal { reason } => {
                    tracing::error!(elapsed_ms, %reason, "terminal send failure")
                }
            }
            outcome
        }
        .instrument(tracing::debug_span!(
            "sender.send",
            job_id = job.id,
            peer = %job.recipient.peer,
            urgent = job.urgent,
        ))
        .await
    }
}
