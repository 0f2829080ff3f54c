// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use magpie_core::test_support;
use tempfile::tempdir;

fn record(id: i64, error: &str) -> FailedRecord {
    FailedRecord {
        job: test_support::job(id, "doomed"),
        failed_at: test_support::epoch(),
        error: error.to_string(),
    }
}

#[test]
fn append_then_read_preserves_order() {
    let dir = tempdir().unwrap();
    let store = FailedStore::new(dir.path().join("failed.jsonl"));

    store.append(&record(1, "peer blocked")).unwrap();
    store.append(&record(2, "peer deleted")).unwrap();

    let records = store.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].job.id, 1);
    assert_eq!(records[0].error, "peer blocked");
    assert_eq!(records[1].job.id, 2);
}

#[test]
fn read_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let store = FailedStore::new(dir.path().join("failed.jsonl"));
    assert!(store.read_all().unwrap().is_empty());
}

#[test]
fn corrupt_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("failed.jsonl");
    let store = FailedStore::new(&path);

    store.append(&record(1, "first")).unwrap();
    // Simulate a torn write between two valid records.
    {
        use std::io::Write;
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"job\": truncated\n").unwrap();
    }
    store.append(&record(2, "second")).unwrap();

    let records = store.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].job.id, 2);
}

#[test]
fn records_are_one_json_line_each() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("failed.jsonl");
    FailedStore::new(&path).append(&record(7, "gone")).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 1);
    let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(value["job"]["id"], 7);
    assert_eq!(value["error"], "gone");
}
