// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key callback debouncing.
//!
//! Each key moves through `Idle → Armed → (Fired | Flushed)`. Arming an
//! already-armed key cancels its timer and replaces the callback (last
//! write wins). At most one live timer exists per key; a generation
//! counter keeps a cancelled timer from firing a newer entry. Callbacks
//! always run outside the map lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

type Callback = Box<dyn FnOnce() + Send>;

struct Entry {
    generation: u64,
    callback: Callback,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceState {
    entries: HashMap<i64, Entry>,
    next_generation: u64,
}

struct DebounceInner {
    state: Mutex<DebounceState>,
}

impl DebounceInner {
    /// Timer expiry: remove the entry if it still belongs to this timer's
    /// generation, then run the callback outside the lock.
    fn fire(&self, key: i64, generation: u64) {
        let callback = {
            let mut state = self.state.lock();
            match state.entries.get(&key) {
                Some(entry) if entry.generation == generation => {
                    state.entries.remove(&key).map(|entry| entry.callback)
                }
                _ => None,
            }
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Delays and collapses per-key callbacks until the key is quiet for the
/// configured duration.
pub struct Debouncer {
    delay: Duration,
    inner: Arc<DebounceInner>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Arc::new(DebounceInner {
                state: Mutex::new(DebounceState::default()),
            }),
        }
    }

    /// Schedule `callback` to run once `key` has been quiet for the
    /// delay. Re-arming an armed key cancels its timer, replaces the
    /// callback, and restarts the wait.
    pub fn debounce(&self, key: i64, callback: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        if let Some(previous) = state.entries.remove(&key) {
            previous.timer.abort();
            debug!(key, "debounce re-armed");
        }

        let timer = tokio::spawn({
            let inner = Arc::clone(&self.inner);
            let delay = self.delay;
            async move {
                tokio::time::sleep(delay).await;
                inner.fire(key, generation);
            }
        });

        state.entries.insert(
            key,
            Entry {
                generation,
                callback: Box::new(callback),
                timer,
            },
        );
    }

    /// Number of armed keys.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Flush every pending entry immediately: timers are cancelled and
    /// callbacks run (outside the lock) so no scheduled work is lost.
    pub fn stop(&self) {
        let entries: Vec<Entry> = {
            let mut state = self.inner.state.lock();
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        if !entries.is_empty() {
            debug!(flushed = entries.len(), "debouncer flushing on stop");
        }
        for entry in entries {
            entry.timer.abort();
            (entry.callback)();
        }
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
