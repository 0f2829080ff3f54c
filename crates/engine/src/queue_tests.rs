// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use magpie_adapters::FakeSender;
use magpie_core::test_support::{self, draft};
use magpie_core::FakeClock;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    queue: NotificationQueue<FakeSender, FakeClock>,
    sender: FakeSender,
    clock: FakeClock,
    store: QueueStateFile,
    failed: FailedStore,
}

/// Clock frozen at 2025-01-10 10:00:00Z, schedule in UTC.
fn fixture(slots: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = QueueStateFile::new(dir.path().join("queue.json"));
    let failed = FailedStore::new(dir.path().join("failed.jsonl"));
    let sender = FakeSender::new();
    let clock = test_support::fake_clock();
    let (schedule, rejected) = Schedule::parse_lenient(slots);
    assert!(rejected.is_empty());
    let queue = NotificationQueue::new(
        sender.clone(),
        clock.clone(),
        schedule,
        Tz::UTC,
        store.clone(),
        failed.clone(),
    );
    Fixture {
        _dir: dir,
        queue,
        sender,
        clock,
        store,
        failed,
    }
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Let the worker and its spawned tasks run; auto-advance covers timers.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test(start_paused = true)]
async fn urgent_jobs_bypass_the_schedule() {
    let fx = fixture(&["08:00", "17:00"]);
    fx.queue.start().unwrap();

    fx.queue.enqueue(draft(1, true, "now!")).unwrap();
    settle().await;

    assert_eq!(fx.sender.sent_ids(), vec![1]);
    let stats = fx.queue.stats();
    assert_eq!(stats.urgent_len, 0);
    assert_eq!(stats.regular_len, 0);
}

#[tokio::test(start_paused = true)]
async fn regular_jobs_wait_for_the_next_slot() {
    let fx = fixture(&["08:00", "17:00"]);
    fx.queue.start().unwrap();

    fx.queue.enqueue(draft(1, false, "later")).unwrap();
    settle().await;
    assert!(fx.sender.sent_ids().is_empty());
    assert_eq!(fx.queue.stats().regular_len, 1);

    // 17:00 arrives: the whole regular list drains at once.
    fx.clock.set(utc(2025, 1, 10, 17, 0, 0));
    tokio::time::sleep(Duration::from_secs(7 * 3600 + 60)).await;

    assert_eq!(fx.sender.sent_ids(), vec![1]);
    let stats = fx.queue.stats();
    assert_eq!(stats.regular_len, 0);
    assert_eq!(stats.last_regular_drain_at, Some(utc(2025, 1, 10, 17, 0, 0)));
}

#[tokio::test(start_paused = true)]
async fn ids_are_monotonic_within_a_run() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();

    let a = fx.queue.enqueue(draft(1, false, "a")).unwrap();
    let b = fx.queue.enqueue(draft(2, false, "b")).unwrap();
    let c = fx.queue.enqueue(draft(3, true, "c")).unwrap();
    assert!(a < b && b < c);
}

#[tokio::test(start_paused = true)]
async fn ids_stay_monotonic_across_restart() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    fx.queue.enqueue(draft(1, false, "one")).unwrap();
    fx.queue.enqueue(draft(2, false, "two")).unwrap();
    settle().await;

    // Second queue over the same store simulates a restart.
    let restarted = NotificationQueue::new(
        fx.sender.clone(),
        fx.clock.clone(),
        Schedule::parse_lenient(["08:00"]).0,
        Tz::UTC,
        fx.store.clone(),
        fx.failed.clone(),
    );
    restarted.start().unwrap();
    settle().await;

    assert_eq!(restarted.stats().regular_len, 2);
    let next = restarted.enqueue(draft(3, false, "three")).unwrap();
    assert!(next > 2);
}

#[tokio::test(start_paused = true)]
async fn fifo_within_class_and_urgent_before_regular() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();

    let r1 = fx.queue.enqueue(draft(1, false, "r1")).unwrap();
    let r2 = fx.queue.enqueue(draft(2, false, "r2")).unwrap();
    let u1 = fx.queue.enqueue(draft(3, true, "u1")).unwrap();
    let u2 = fx.queue.enqueue(draft(4, true, "u2")).unwrap();

    fx.queue.flush_immediately("test");
    settle().await;

    assert_eq!(fx.sender.sent_ids(), vec![u1, u2, r1, r2]);
}

#[tokio::test(start_paused = true)]
async fn flush_drains_both_lists() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();

    fx.queue.enqueue(draft(1, false, "regular")).unwrap();
    settle().await;
    assert!(fx.sender.sent_ids().is_empty());

    fx.queue.flush_immediately("operator request");
    settle().await;
    assert_eq!(fx.sender.sent_ids(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn retries_reuse_the_same_idempotency_token() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    fx.sender.push_outcome(SendOutcome::retryable("net down"));
    fx.sender.push_outcome(SendOutcome::retryable("still down"));

    fx.queue.enqueue(draft(1, true, "persistent")).unwrap();
    // Backoff between attempts is ~1s then ~2s; auto-advance covers it.
    tokio::time::sleep(Duration::from_secs(10)).await;

    let calls = fx.sender.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].idempotency_key, calls[1].idempotency_key);
    assert_eq!(calls[1].idempotency_key, calls[2].idempotency_key);
    assert_eq!(fx.queue.stats().urgent_len, 0);
}

#[tokio::test(start_paused = true)]
async fn flood_wait_hint_overrides_backoff() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    fx.sender.push_outcome(SendOutcome::Retryable {
        reason: "flood wait".to_string(),
        retry_after: Some(Duration::from_secs(30)),
    });

    fx.queue.enqueue(draft(1, true, "flooded")).unwrap();
    settle().await;
    assert_eq!(fx.sender.calls().len(), 1);

    // Normal backoff would retry after ~1s; the hint defers to 30s.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fx.sender.calls().len(), 1);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(fx.sender.calls().len(), 2);
    assert_eq!(fx.queue.stats().urgent_len, 0);
}

#[tokio::test(start_paused = true)]
async fn terminal_failure_lands_in_the_failed_store() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    fx.sender.push_outcome(SendOutcome::terminal("peer blocked"));

    fx.queue.enqueue(draft(1, true, "doomed")).unwrap();
    settle().await;

    assert_eq!(fx.queue.stats().urgent_len, 0);
    let records = fx.failed.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].job.id, 1);
    assert_eq!(records[0].error, "peer blocked");

    // And the persisted snapshot no longer carries the job.
    fx.queue.close(Duration::from_secs(5)).await.unwrap();
    assert!(fx.store.load().unwrap().is_empty());
}

#[derive(Clone)]
struct PanickingSender;

#[async_trait::async_trait]
impl PreparedSender for PanickingSender {
    async fn send(&self, _job: &Job, _idempotency_key: i64) -> SendOutcome {
        panic!("sender blew up");
    }
}

#[tokio::test(start_paused = true)]
async fn sender_panic_is_recovered_as_terminal() {
    let dir = TempDir::new().unwrap();
    let store = QueueStateFile::new(dir.path().join("queue.json"));
    let failed = FailedStore::new(dir.path().join("failed.jsonl"));
    let queue = NotificationQueue::new(
        PanickingSender,
        test_support::fake_clock(),
        Schedule::parse_lenient(["08:00"]).0,
        Tz::UTC,
        store,
        failed.clone(),
    );
    queue.start().unwrap();

    queue.enqueue(draft(1, true, "kaboom")).unwrap();
    settle().await;

    assert_eq!(queue.stats().urgent_len, 0);
    let records = failed.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].error.contains("panicked"));
}

#[tokio::test(start_paused = true)]
async fn snapshot_survives_restart_in_order() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    fx.queue.enqueue(draft(1, false, "first")).unwrap();
    fx.queue.enqueue(draft(2, false, "second")).unwrap();
    settle().await;

    let snapshot = fx.store.load().unwrap();
    let ids: Vec<i64> = snapshot.regular.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(snapshot.next_id > 2);
    assert!(snapshot.last_flush_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn missed_slot_triggers_catch_up_drain_on_start() {
    let fx = fixture(&["08:00", "17:00"]);

    // Pre-seed the store: last regular drain the evening before, one
    // regular job pending. The 08:00 slot has passed by now (10:00).
    let seeded = QueueSnapshot {
        next_id: 2,
        urgent: vec![],
        regular: vec![test_support::job(1, "missed")],
        last_flush_at: None,
        last_regular_drain_at: Some(utc(2025, 1, 9, 17, 0, 0)),
    };
    fx.store.save(&seeded).unwrap();

    fx.queue.start().unwrap();
    settle().await;

    assert_eq!(fx.sender.sent_ids(), vec![1]);
    assert_eq!(fx.queue.stats().regular_len, 0);
}

#[tokio::test(start_paused = true)]
async fn enqueue_after_close_is_rejected() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    fx.queue.close(Duration::from_secs(1)).await.unwrap();

    let err = fx.queue.enqueue(draft(1, true, "late")).unwrap_err();
    assert!(matches!(err, QueueError::Closed));
}

#[tokio::test(start_paused = true)]
async fn close_drains_pending_jobs() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    fx.queue.enqueue(draft(1, false, "going out")).unwrap();

    fx.queue.close(Duration::from_secs(5)).await.unwrap();
    assert_eq!(fx.sender.sent_ids(), vec![1]);
    assert!(fx.store.load().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn close_timeout_leaves_jobs_on_disk() {
    let fx = fixture(&["08:00"]);
    fx.queue.start().unwrap();
    // Enough retryable outcomes to outlast any drain attempt.
    for _ in 0..32 {
        fx.sender.push_outcome(SendOutcome::retryable("never works"));
    }
    fx.queue.enqueue(draft(1, true, "stuck")).unwrap();
    settle().await;

    let err = fx.queue.close(Duration::from_secs(3)).await.unwrap_err();
    assert!(matches!(err, QueueError::ShutdownTimeout));

    let snapshot = fx.store.load().unwrap();
    assert_eq!(snapshot.urgent.len(), 1);
    assert_eq!(snapshot.urgent[0].id, 1);
}

#[tokio::test(start_paused = true)]
async fn stats_report_schedule_and_location() {
    let fx = fixture(&["08:00", "17:00"]);
    fx.queue.start().unwrap();

    let stats = fx.queue.stats();
    assert_eq!(stats.location, Tz::UTC);
    assert_eq!(stats.next_schedule_at, utc(2025, 1, 10, 17, 0, 0));
}
