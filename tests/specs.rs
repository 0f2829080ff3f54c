//! Behavioral specifications for the magpie pipeline.
//!
//! These tests are end-to-end over the library surface: a fake update
//! source feeds the dispatcher, a fake sender records deliveries, and a
//! fake clock plus tokio's paused time drive the schedule.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use magpie_adapters::{FakeSender, FakeUpdateSource, SendOutcome, UpdateSource};
use magpie_core::{FakeClock, MessageUpdate, PeerRef, Schedule, UpdateEvent};
use magpie_engine::{
    register_pipeline_nodes, CollaboratorNodes, Debouncer, Deduplicator, LazyUpdateSink,
    LifecycleManager, NodeSpec, NotificationQueue, NotifierKind, UpdateDispatcher,
};
use magpie_filter::FilterEngine;
use magpie_storage::{FailedStore, QueueStateFile};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const RECIPIENTS: &str = r#"{
    "me": {"peer": {"kind": "user", "id": 777}}
}"#;

const URGENT_RULES: &str = r#"[{
    "name": "watch",
    "allow": {"type": "keyword", "pattern": "alert"},
    "recipients": ["me"],
    "urgent": true
}]"#;

const REGULAR_RULES: &str = r#"[{
    "name": "digest",
    "allow": {"type": "keyword", "pattern": "alert"},
    "recipients": ["me"],
    "urgent": false
}]"#;

struct Pipeline {
    _dir: TempDir,
    manager: LifecycleManager,
    source: Arc<FakeUpdateSource>,
    sender: FakeSender,
    clock: FakeClock,
    queue: Arc<NotificationQueue<FakeSender, FakeClock>>,
    store: QueueStateFile,
    failed: FailedStore,
}

/// Full pipeline behind a fake transport. Clock frozen at
/// 2025-01-10 10:00:00Z; schedule 08:00/17:00 UTC; debounce 2000 ms.
fn pipeline(rules: &str) -> Pipeline {
    let dir = TempDir::new().unwrap();
    pipeline_in(dir, rules)
}

fn pipeline_in(dir: TempDir, rules: &str) -> Pipeline {
    let filters_path = dir.path().join("filters.json");
    let recipients_path = dir.path().join("recipients.json");
    std::fs::write(&filters_path, rules).unwrap();
    std::fs::write(&recipients_path, RECIPIENTS).unwrap();

    let clock = FakeClock::at(Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap());
    let sender = FakeSender::new();
    let store = QueueStateFile::new(dir.path().join("queue.json"));
    let failed = FailedStore::new(dir.path().join("failed.jsonl"));

    let filters = Arc::new(FilterEngine::load(&filters_path, &recipients_path).unwrap());
    let dedup = Arc::new(Deduplicator::new(Duration::from_secs(300)));
    let debounce = Arc::new(Debouncer::new(Duration::from_millis(2000)));
    let (schedule, rejected) = Schedule::parse_lenient(["08:00", "17:00"]);
    assert!(rejected.is_empty());
    let queue = Arc::new(NotificationQueue::new(
        sender.clone(),
        clock.clone(),
        schedule,
        Tz::UTC,
        store.clone(),
        failed.clone(),
    ));
    let dispatcher = UpdateDispatcher::new(
        Arc::clone(&dedup),
        Arc::clone(&debounce),
        filters,
        Arc::clone(&queue),
        NotifierKind::Client,
    );
    let sink = LazyUpdateSink::new();

    let source = Arc::new(FakeUpdateSource::new());
    source.register(Arc::new(sink.clone()));

    let mut manager = LifecycleManager::new();
    manager
        .register(NodeSpec::new("connection_manager"))
        .unwrap();
    register_pipeline_nodes(
        &mut manager,
        dedup,
        debounce,
        Arc::clone(&queue),
        dispatcher,
        sink,
        &CollaboratorNodes::default(),
        Duration::from_secs(5),
    )
    .unwrap();

    Pipeline {
        _dir: dir,
        manager,
        source,
        sender,
        clock,
        queue,
        store,
        failed,
    }
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, h, m, 0).unwrap()
}

fn message(chat: i64, msg_id: i32, edit_date: Option<i64>, text: &str) -> UpdateEvent {
    let update = MessageUpdate {
        peer: PeerRef::chat(chat),
        message_id: msg_id,
        edit_date,
        text: text.to_string(),
        entities: Vec::new(),
    };
    if edit_date.is_some() {
        UpdateEvent::EditDirectMessage(update)
    } else {
        UpdateEvent::NewDirectMessage(update)
    }
}

/// Past the debounce window plus send settling.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2200)).await;
}

#[tokio::test(start_paused = true)]
async fn urgent_jobs_bypass_the_schedule() {
    let mut px = pipeline(URGENT_RULES);
    px.manager.start_all(CancellationToken::new()).await.unwrap();

    px.source.push(message(10, 1, None, "alert: disk full"));
    settle().await;

    assert_eq!(px.sender.sent_ids().len(), 1);
    assert_eq!(px.queue.stats().urgent_len, 0);
    px.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn regular_jobs_wait_for_the_schedule_slot() {
    let mut px = pipeline(REGULAR_RULES);
    px.manager.start_all(CancellationToken::new()).await.unwrap();

    px.source.push(message(10, 1, None, "alert: digest me"));
    settle().await;

    // Gated: nothing sent at 10:00.
    assert!(px.sender.sent_ids().is_empty());
    assert_eq!(px.queue.stats().regular_len, 1);
    assert_eq!(px.queue.stats().next_schedule_at, at(17, 0));

    // The 17:00 slot fires and the whole regular list drains.
    px.clock.set(at(17, 0));
    tokio::time::sleep(Duration::from_secs(7 * 3600 + 120)).await;

    assert_eq!(px.sender.sent_ids().len(), 1);
    let stats = px.queue.stats();
    assert_eq!(stats.regular_len, 0);
    assert_eq!(stats.last_regular_drain_at, Some(at(17, 0)));
    px.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn duplicate_updates_are_suppressed_but_edits_pass() {
    let mut px = pipeline(URGENT_RULES);
    px.manager.start_all(CancellationToken::new()).await.unwrap();

    px.source.push(message(10, 5, None, "alert one"));
    px.source.push(message(10, 5, None, "alert one"));
    settle().await;
    assert_eq!(px.sender.sent_ids().len(), 1);

    // A real edit carries a fresh edit_date and is processed.
    px.source
        .push(message(10, 5, Some(1_700_000_000), "alert one (edited)"));
    settle().await;
    assert_eq!(px.sender.sent_ids().len(), 2);
    px.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_notification() {
    let mut px = pipeline(URGENT_RULES);
    px.manager.start_all(CancellationToken::new()).await.unwrap();

    px.source.push(message(10, 5, None, "alert v1"));
    tokio::time::advance(Duration::from_millis(500)).await;
    px.source.push(message(10, 5, Some(1_700_000_001), "alert v2"));
    settle().await;

    let calls = px.sender.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].job.payload.text, "alert v2");
    px.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn terminal_failures_land_in_the_failed_log() {
    let mut px = pipeline(URGENT_RULES);
    px.manager.start_all(CancellationToken::new()).await.unwrap();
    px.sender.push_outcome(SendOutcome::terminal("peer blocked"));

    px.source.push(message(10, 9, None, "alert doomed"));
    settle().await;

    assert_eq!(px.queue.stats().urgent_len, 0);
    let records = px.failed.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error, "peer blocked");
    assert_eq!(records[0].job.payload.text, "alert doomed");

    px.manager.shutdown().await;
    // Failed jobs never come back to the queue snapshot.
    assert!(px.store.load().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn queued_jobs_survive_a_restart_in_order() {
    let mut px = pipeline(REGULAR_RULES);
    px.manager.start_all(CancellationToken::new()).await.unwrap();

    px.source.push(message(10, 1, None, "alert first"));
    settle().await;
    px.source.push(message(10, 2, None, "alert second"));
    settle().await;
    assert_eq!(px.queue.stats().regular_len, 2);

    // Simulate a crash: no shutdown, just rebuild over the same files.
    let dir = px._dir;
    let snapshot = px.store.load().unwrap();
    assert_eq!(snapshot.regular.len(), 2);

    let mut restarted = pipeline_in(dir, REGULAR_RULES);
    restarted
        .manager
        .start_all(CancellationToken::new())
        .await
        .unwrap();

    let stats = restarted.queue.stats();
    assert_eq!(stats.regular_len, 2);

    // Order is preserved and new ids continue past the loaded ones.
    let reloaded = restarted.store.load().unwrap();
    let texts: Vec<&str> = reloaded
        .regular
        .iter()
        .map(|j| j.payload.text.as_str())
        .collect();
    assert_eq!(texts, vec!["alert first", "alert second"]);
    assert!(reloaded.next_id > reloaded.regular.iter().map(|j| j.id).max().unwrap());

    restarted.source.push(message(10, 3, None, "alert third"));
    settle().await;
    let after = restarted.store.load().unwrap();
    let max_old = reloaded.regular.iter().map(|j| j.id).max().unwrap();
    assert!(after.regular.iter().any(|j| j.id > max_old));
    restarted.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_pending_regular_jobs() {
    let mut px = pipeline(REGULAR_RULES);
    px.manager.start_all(CancellationToken::new()).await.unwrap();

    px.source.push(message(10, 1, None, "alert lingering"));
    settle().await;
    assert_eq!(px.queue.stats().regular_len, 1);

    // Close gets a bounded drain window; the job goes out before exit.
    px.manager.shutdown().await;
    assert_eq!(px.sender.sent_ids().len(), 1);
    assert!(px.store.load().unwrap().is_empty());
}
