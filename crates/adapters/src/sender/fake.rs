// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake prepared sender for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{PreparedSender, SendOutcome};
use async_trait::async_trait;
use magpie_core::Job;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Recorded send attempt.
#[derive(Debug, Clone)]
pub struct SendCall {
    pub job: Job,
    pub idempotency_key: i64,
}

struct FakeSenderState {
    calls: Vec<SendCall>,
    script: VecDeque<SendOutcome>,
}

/// Fake sender for testing.
///
/// Outcomes are scripted FIFO via [`FakeSender::push_outcome`]; once the
/// script runs dry every attempt succeeds.
#[derive(Clone)]
pub struct FakeSender {
    inner: Arc<Mutex<FakeSenderState>>,
}

impl Default for FakeSender {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeSenderState {
                calls: Vec::new(),
                script: VecDeque::new(),
            })),
        }
    }
}

impl FakeSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome for the next unscripted attempt.
    pub fn push_outcome(&self, outcome: SendOutcome) {
        self.inner.lock().script.push_back(outcome);
    }

    /// All recorded attempts, in call order.
    pub fn calls(&self) -> Vec<SendCall> {
        self.inner.lock().calls.clone()
    }

    /// Job ids of recorded attempts, in call order.
    pub fn sent_ids(&self) -> Vec<i64> {
        self.inner.lock().calls.iter().map(|c| c.job.id).collect()
    }
}

#[async_trait]
impl PreparedSender for FakeSender {
    async fn send(&self, job: &Job, idempotency_key: i64) -> SendOutcome {
        let mut state = self.inner.lock();
        state.calls.push(SendCall {
            job: job.clone(),
            idempotency_key,
        });
        state.script.pop_front().unwrap_or(SendOutcome::Ok)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
