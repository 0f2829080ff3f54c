// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable, schedule-aware notification queue.
//!
//! Two FIFO lists live under one mutex: `urgent` drains on enqueue,
//! `regular` waits for the next schedule slot. A single worker task owns
//! all draining; it wakes on urgent enqueues, the schedule timer, an
//! explicit flush, or close. Jobs leave their list only after a
//! conclusive send outcome, so the persisted snapshot always covers the
//! in-flight job and delivery is at-least-once; the deterministic
//! idempotency token lets a de-duplicating transport absorb the
//! resulting retries.

use crate::backoff;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use magpie_adapters::{PreparedSender, SendOutcome};
use magpie_core::{Clock, Job, JobDraft, Schedule};
use magpie_storage::{FailedRecord, FailedStore, QueueSnapshot, QueueStateFile, StoreError};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delivery attempts per job within one drain pass.
const MAX_SEND_ATTEMPTS: u32 = 5;

/// Poll period while waiting for an in-flight snapshot write to settle.
const PERSIST_SETTLE_POLL: Duration = Duration::from_millis(10);

/// Queue errors surfaced to callers.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("shutdown drain exceeded its deadline")]
    ShutdownTimeout,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Observability snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub urgent_len: usize,
    pub regular_len: usize,
    pub last_regular_drain_at: Option<DateTime<Utc>>,
    pub last_flush_at: Option<DateTime<Utc>>,
    pub next_schedule_at: DateTime<Utc>,
    pub location: Tz,
}

#[derive(Debug)]
enum Wake {
    Urgent,
    Flush { reason: String },
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priority {
    Urgent,
    Regular,
}

#[derive(Default)]
struct QueueState {
    urgent: VecDeque<Job>,
    regular: VecDeque<Job>,
    next_id: i64,
    closed: bool,
    last_regular_drain_at: Option<DateTime<Utc>>,
    last_flush_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct PersistState {
    in_flight: bool,
    /// State changed while a write was in flight; one more write runs
    /// with the then-latest state.
    dirty: bool,
}

struct QueueInner<S, C> {
    sender: S,
    clock: C,
    schedule: Schedule,
    location: Tz,
    store: QueueStateFile,
    failed: FailedStore,
    state: Mutex<QueueState>,
    persist: Mutex<PersistState>,
    wake_tx: mpsc::UnboundedSender<Wake>,
}

/// The notification queue.
pub struct NotificationQueue<S, C> {
    inner: Arc<QueueInner<S, C>>,
    wake_rx: Mutex<Option<mpsc::UnboundedReceiver<Wake>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: PreparedSender, C: Clock> NotificationQueue<S, C> {
    pub fn new(
        sender: S,
        clock: C,
        schedule: Schedule,
        location: Tz,
        store: QueueStateFile,
        failed: FailedStore,
    ) -> Self {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(QueueInner {
                sender,
                clock,
                schedule,
                location,
                store,
                failed,
                state: Mutex::new(QueueState::default()),
                persist: Mutex::new(PersistState::default()),
                wake_tx,
            }),
            wake_rx: Mutex::new(Some(wake_rx)),
            worker: Mutex::new(None),
        }
    }

    /// Load the persisted snapshot, restore both lists, and spawn the
    /// worker. `next_id` is raised past every loaded job id so ids stay
    /// monotone across restarts. Idempotent: a second call is a no-op.
    pub fn start(&self) -> Result<(), QueueError> {
        let Some(wake_rx) = self.wake_rx.lock().take() else {
            return Ok(());
        };

        let snapshot = self.inner.store.load()?;
        let catch_up = {
            let mut state = self.inner.state.lock();
            state.next_id = snapshot.next_id.max(snapshot.max_job_id() + 1).max(1);
            state.last_flush_at = snapshot.last_flush_at;
            state.last_regular_drain_at = snapshot.last_regular_drain_at;
            state.urgent = snapshot.urgent.into();
            state.regular = snapshot.regular.into();
            info!(
                urgent = state.urgent.len(),
                regular = state.regular.len(),
                next_id = state.next_id,
                "loaded queue snapshot"
            );

            // A slot passed while we were down: drain immediately instead
            // of waiting for the next one.
            let now = self.inner.clock.now_utc();
            match state.last_regular_drain_at {
                Some(last) => {
                    self.inner.schedule.next_slot_after(last, self.inner.location) <= now
                }
                None => false,
            }
        };

        let worker = tokio::spawn(worker_loop(Arc::clone(&self.inner), wake_rx, catch_up));
        *self.worker.lock() = Some(worker);
        Ok(())
    }

    /// Assign an id, stamp timestamps, and append to the matching list.
    /// Urgent jobs wake the worker immediately.
    pub fn enqueue(&self, draft: JobDraft) -> Result<i64, QueueError> {
        let now = self.inner.clock.now_utc();
        let job = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            let id = state.next_id;
            state.next_id += 1;

            // Personal schedule/timezone override the application ones
            // for the advisory scheduled_at stamp; drains still follow
            // the application timer.
            let scheduled_at = if draft.urgent {
                now
            } else {
                let schedule = draft
                    .recipient
                    .schedule
                    .as_ref()
                    .unwrap_or(&self.inner.schedule);
                let location = draft.recipient.timezone.unwrap_or(self.inner.location);
                schedule.next_slot_after(now, location)
            };

            let job = Job {
                id,
                created_at: now,
                scheduled_at,
                urgent: draft.urgent,
                recipient: draft.recipient,
                payload: draft.payload,
            };
            if job.urgent {
                state.urgent.push_back(job.clone());
            } else {
                state.regular.push_back(job.clone());
            }
            job
        };

        QueueInner::schedule_persist(&self.inner);
        if job.urgent {
            let _ = self.inner.wake_tx.send(Wake::Urgent);
        }
        debug!(job_id = job.id, urgent = job.urgent, "job enqueued");
        Ok(job.id)
    }

    /// Ask the worker to drain both lists now, urgent first.
    pub fn flush_immediately(&self, reason: impl Into<String>) {
        let _ = self.inner.wake_tx.send(Wake::Flush {
            reason: reason.into(),
        });
    }

    pub fn stats(&self) -> QueueStats {
        let now = self.inner.clock.now_utc();
        let state = self.inner.state.lock();
        QueueStats {
            urgent_len: state.urgent.len(),
            regular_len: state.regular.len(),
            last_regular_drain_at: state.last_regular_drain_at,
            last_flush_at: state.last_flush_at,
            next_schedule_at: self.inner.schedule.next_slot_after(now, self.inner.location),
            location: self.inner.location,
        }
    }

    /// Stop intake, drain both lists within `deadline`, persist, and
    /// join the worker. Jobs that cannot be sent in time stay on disk
    /// for the next run; that case surfaces as [`QueueError::ShutdownTimeout`].
    pub async fn close(&self, deadline: Duration) -> Result<(), QueueError> {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
        }
        info!("closing notification queue");
        let deadline_at = tokio::time::Instant::now() + deadline;

        // Stop the worker first so the final drain has exclusive
        // ownership of the lists.
        let _ = self.inner.wake_tx.send(Wake::Close);
        let handle = self.worker.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout_at(deadline_at, &mut handle)
                .await
                .is_err()
            {
                // Stuck in a retry backoff; the in-flight job is still in
                // its list and therefore still on disk.
                warn!("worker did not stop before the deadline; aborting it");
                handle.abort();
                let _ = handle.await;
            }
        }

        let drained = tokio::time::timeout_at(deadline_at, async {
            QueueInner::drain(&self.inner, Priority::Urgent).await;
            QueueInner::drain(&self.inner, Priority::Regular).await;
        })
        .await
        .is_ok();

        // Let any coalesced write finish, then write the final image.
        self.inner.settle_persist().await;
        self.inner.persist_blocking().await?;

        let remaining = {
            let state = self.inner.state.lock();
            state.urgent.len() + state.regular.len()
        };
        if !drained || remaining > 0 {
            warn!(remaining, "shutdown drain incomplete; jobs remain persisted");
            return Err(QueueError::ShutdownTimeout);
        }
        Ok(())
    }
}

/// Deterministic idempotency token for a job: stable across retries so a
/// de-duplicating transport absorbs them.
fn idempotency_key(job: &Job) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(job.id.to_be_bytes());
    hasher.update(job.recipient.peer.id.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Single worker: owns all draining. Inputs are the wake channel, the
/// schedule timer, and close.
async fn worker_loop<S: PreparedSender, C: Clock>(
    inner: Arc<QueueInner<S, C>>,
    mut wake_rx: mpsc::UnboundedReceiver<Wake>,
    catch_up: bool,
) {
    if catch_up {
        info!("missed schedule slot while down; catch-up drain");
        QueueInner::drain(&inner, Priority::Regular).await;
    }

    loop {
        let now = inner.clock.now_utc();
        let next_at = inner.schedule.next_slot_after(now, inner.location);
        let sleep_for = (next_at - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            wake = wake_rx.recv() => match wake {
                Some(Wake::Urgent) => {
                    QueueInner::drain(&inner, Priority::Urgent).await;
                }
                Some(Wake::Flush { reason }) => {
                    info!(%reason, "explicit flush; draining both lists");
                    QueueInner::drain(&inner, Priority::Urgent).await;
                    QueueInner::drain(&inner, Priority::Regular).await;
                }
                Some(Wake::Close) | None => break,
            },
            _ = tokio::time::sleep(sleep_for) => {
                debug!(slot = %next_at, "schedule slot reached");
                QueueInner::drain(&inner, Priority::Regular).await;
            }
        }
    }
    debug!("queue worker exited");
}

impl<S: PreparedSender, C: Clock> QueueInner<S, C> {
    fn front(&self, priority: Priority) -> Option<Job> {
        let state = self.state.lock();
        match priority {
            Priority::Urgent => state.urgent.front().cloned(),
            Priority::Regular => state.regular.front().cloned(),
        }
    }

    fn pop_front(&self, priority: Priority) {
        let mut state = self.state.lock();
        match priority {
            Priority::Urgent => state.urgent.pop_front(),
            Priority::Regular => state.regular.pop_front(),
        };
    }

    /// One pass over a list in FIFO order.
    ///
    /// The job under delivery stays at the head of its list until the
    /// outcome is conclusive, so a concurrently-written snapshot (or a
    /// crash) never loses it. A job that exhausts its retries stays at
    /// the head and ends the pass, preserving FIFO for the whole class.
    async fn drain(inner: &Arc<Self>, priority: Priority) {
        while let Some(job) = inner.front(priority) {
            let delivered = inner.send_job(&job).await;
            if delivered {
                inner.pop_front(priority);
                Self::schedule_persist(inner);
            } else {
                break;
            }
        }

        if priority == Priority::Regular {
            let now = inner.clock.now_utc();
            inner.state.lock().last_regular_drain_at = Some(now);
            Self::schedule_persist(inner);
        }
    }

    /// Deliver one job: up to [`MAX_SEND_ATTEMPTS`] attempts with
    /// exponential backoff (flood-wait hints override the delay).
    /// Returns whether the job is finished with (sent or terminally
    /// failed) and may leave its list.
    async fn send_job(&self, job: &Job) -> bool {
        let token = idempotency_key(job);
        for attempt in 1..=MAX_SEND_ATTEMPTS {
            match self.attempt_send(job, token).await {
                SendOutcome::Ok => {
                    debug!(job_id = job.id, attempt, "job delivered");
                    return true;
                }
                SendOutcome::Terminal { reason } => {
                    warn!(job_id = job.id, %reason, "terminal send failure");
                    self.record_failure(job, &reason);
                    return true;
                }
                SendOutcome::Retryable {
                    reason,
                    retry_after,
                } => {
                    if attempt == MAX_SEND_ATTEMPTS {
                        warn!(
                            job_id = job.id,
                            %reason, "retries exhausted; leaving job at head of its list"
                        );
                        return false;
                    }
                    let delay = retry_after.unwrap_or_else(|| backoff::retry_delay(attempt));
                    debug!(
                        job_id = job.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "retryable send failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        false
    }

    /// One attempt, isolated in its own task so a panicking sender is
    /// recovered and treated as terminal rather than killing the worker.
    async fn attempt_send(&self, job: &Job, token: i64) -> SendOutcome {
        let sender = self.sender.clone();
        let job = job.clone();
        let attempt = tokio::spawn(async move { sender.send(&job, token).await });
        match attempt.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => SendOutcome::Terminal {
                reason: format!("sender panicked: {e}"),
            },
            Err(_) => SendOutcome::retryable("send task cancelled"),
        }
    }

    fn record_failure(&self, job: &Job, reason: &str) {
        let record = FailedRecord {
            job: job.clone(),
            failed_at: self.clock.now_utc(),
            error: reason.to_string(),
        };
        if let Err(e) = self.failed.append(&record) {
            warn!(job_id = job.id, error = %e, "failed to append failed-job record");
        }
    }

    /// Deep-copied image of the current state.
    fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            next_id: state.next_id,
            urgent: state.urgent.iter().cloned().collect(),
            regular: state.regular.iter().cloned().collect(),
            last_flush_at: state.last_flush_at,
            last_regular_drain_at: state.last_regular_drain_at,
        }
    }

    /// Request a snapshot write with at most one in flight. A request
    /// landing during a write marks the state dirty; the writer runs one
    /// more time with the state as it is after the current write.
    fn schedule_persist(inner: &Arc<Self>) {
        {
            let mut persist = inner.persist.lock();
            if persist.in_flight {
                persist.dirty = true;
                return;
            }
            persist.in_flight = true;
        }
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            inner.run_persist().await;
        });
    }

    async fn run_persist(self: Arc<Self>) {
        loop {
            // Snapshot at write time so a deferred write always carries
            // the latest state.
            let mut snapshot = self.snapshot();
            let flushed_at = self.clock.now_utc();
            snapshot.last_flush_at = Some(flushed_at);
            let store = self.store.clone();
            let result = tokio::task::spawn_blocking(move || store.save(&snapshot)).await;
            match result {
                Ok(Ok(())) => {
                    self.state.lock().last_flush_at = Some(flushed_at);
                }
                // Transient IO errors: the state is still in memory and
                // the next coalesced write retries.
                Ok(Err(e)) => warn!(error = %e, "queue snapshot write failed; will retry"),
                Err(e) => warn!(error = %e, "queue snapshot writer task failed"),
            }

            let again = {
                let mut persist = self.persist.lock();
                if persist.dirty {
                    persist.dirty = false;
                    true
                } else {
                    persist.in_flight = false;
                    false
                }
            };
            if !again {
                break;
            }
        }
    }

    /// Wait for any in-flight coalesced write to finish.
    async fn settle_persist(&self) {
        loop {
            if !self.persist.lock().in_flight {
                return;
            }
            tokio::time::sleep(PERSIST_SETTLE_POLL).await;
        }
    }

    /// Write the current state directly, bypassing coalescing. Used for
    /// the final flush on close.
    async fn persist_blocking(&self) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot();
        let flushed_at = self.clock.now_utc();
        snapshot.last_flush_at = Some(flushed_at);
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(result) => {
                if result.is_ok() {
                    self.state.lock().last_flush_at = Some(flushed_at);
                }
                result
            }
            Err(e) => {
                warn!(error = %e, "final snapshot writer task failed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
