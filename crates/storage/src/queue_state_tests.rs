// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use magpie_core::test_support;
use std::io::Write;
use tempfile::tempdir;

fn sample_snapshot() -> QueueSnapshot {
    QueueSnapshot {
        next_id: 6,
        urgent: vec![test_support::job(4, "urgent one")],
        regular: vec![test_support::job(2, "first"), test_support::job(5, "second")],
        last_flush_at: Some(test_support::epoch()),
        last_regular_drain_at: None,
    }
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let store = QueueStateFile::new(dir.path().join("queue.json"));

    let snapshot = sample_snapshot();
    store.save(&snapshot).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded, snapshot);
}

#[test]
fn load_missing_file_yields_default() {
    let dir = tempdir().unwrap();
    let store = QueueStateFile::new(dir.path().join("nope.json"));

    let loaded = store.load().unwrap();
    assert_eq!(loaded, QueueSnapshot::default());
    assert!(loaded.is_empty());
}

#[test]
fn save_leaves_no_tmp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.json");
    let store = QueueStateFile::new(&path);

    store.save(&sample_snapshot()).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn fifo_order_survives_round_trip() {
    let dir = tempdir().unwrap();
    let store = QueueStateFile::new(dir.path().join("queue.json"));

    store.save(&sample_snapshot()).unwrap();
    let loaded = store.load().unwrap();

    let ids: Vec<i64> = loaded.regular.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![2, 5]);
}

#[test]
fn max_job_id_spans_both_lists() {
    assert_eq!(sample_snapshot().max_job_id(), 5);
    assert_eq!(QueueSnapshot::default().max_job_id(), 0);
}

#[test]
fn unknown_fields_are_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.json");
    std::fs::write(
        &path,
        r#"{"next_id": 9, "urgent": [], "regular": [], "added_in_v2": [1, 2]}"#,
    )
    .unwrap();

    let loaded = QueueStateFile::new(&path).load().unwrap();
    assert_eq!(loaded.next_id, 9);
}

#[test]
fn corrupt_snapshot_rotates_to_bak_and_loads_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.json");

    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(b"\xe5\x03\x01binary-garbage").unwrap();
    drop(f);

    let loaded = QueueStateFile::new(&path).load().unwrap();
    assert_eq!(loaded, QueueSnapshot::default());

    // Original file rotated out, .bak holds the corrupt content.
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[test]
fn repeated_corruption_keeps_at_most_three_backups() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.json");
    let store = QueueStateFile::new(&path);

    for i in 1..=4u8 {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[i; 4]).unwrap();
        drop(f);
        store.load().unwrap();
    }

    assert_eq!(std::fs::read(path.with_extension("bak")).unwrap(), [4u8; 4]);
    assert_eq!(
        std::fs::read(path.with_extension("bak.2")).unwrap(),
        [3u8; 4]
    );
    assert_eq!(
        std::fs::read(path.with_extension("bak.3")).unwrap(),
        [2u8; 4]
    );
    assert!(!path.with_extension("bak.4").exists());
}
