// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update deduplication over a sliding window.
//!
//! Every probe registers its `(chat_id, msg_id, edit_date)` key for the
//! window and answers whether the key was already present and unexpired.
//! `edit_date == 0` denotes the first version of a message; every edit
//! generates a fresh key. Expired keys are evicted lazily on probe (the
//! insert overwrites them) and by a periodic background sweep.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Background sweep period for expired keys.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DedupKey {
    chat_id: i64,
    msg_id: i32,
    edit_date: i64,
}

/// Thread-safe sliding-window deduplicator.
pub struct Deduplicator {
    window: Duration,
    entries: Arc<Mutex<HashMap<DedupKey, Instant>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Deduplicator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Arc::new(Mutex::new(HashMap::new())),
            sweeper: Mutex::new(None),
        }
    }

    /// Register the key for the window and report whether it was already
    /// present and unexpired at call time.
    ///
    /// A zero window degenerates to "every probe is new".
    pub fn seen(&self, chat_id: i64, msg_id: i32, edit_date: i64) -> bool {
        let key = DedupKey {
            chat_id,
            msg_id,
            edit_date,
        };
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let previous = entries.insert(key, now + self.window);
        matches!(previous, Some(expires_at) if expires_at > now)
    }

    /// Number of live (possibly expired, not yet swept) keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Launch the background sweeper. Idempotent.
    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }
        let entries = Arc::clone(&self.entries);
        *sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so the first sweep
            // happens one full period after start.
            interval.tick().await;
            loop {
                interval.tick().await;
                let now = Instant::now();
                let mut entries = entries.lock();
                let before = entries.len();
                entries.retain(|_, expires_at| *expires_at > now);
                let evicted = before - entries.len();
                if evicted > 0 {
                    debug!(evicted, remaining = entries.len(), "dedup sweep");
                }
            }
        }));
    }

    /// Cancel and join the sweeper. Idempotent.
    pub async fn stop(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
