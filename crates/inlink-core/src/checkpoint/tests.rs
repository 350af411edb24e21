//! Tests for the checkpoint log.

use std::io::Write;

use tempfile::tempdir;

use crate::checkpoint::{dedup_by_unit, CheckpointEntry, CheckpointStore, ResultRow};
use crate::error::JobError;
use crate::job_store::JobId;

fn id(s: &str) -> JobId {
    JobId::parse(s).unwrap()
}

fn suggestion(source: &str, target: &str) -> ResultRow {
    ResultRow::new()
        .with("source_url", source)
        .with("anchor_text", "link")
        .with("target_url", target)
}

#[tokio::test]
async fn append_returns_running_total_and_load_keeps_order() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).await.unwrap();
    let job = id("order");

    let n = store
        .append(&job, 0, &[suggestion("/a", "/b"), suggestion("/a", "/c")])
        .await
        .unwrap();
    assert_eq!(n, 2);
    let n = store.append(&job, 1, &[]).await.unwrap();
    assert_eq!(n, 2);
    let n = store.append(&job, 2, &[suggestion("/c", "/a")]).await.unwrap();
    assert_eq!(n, 3);

    let rows = store.load(&job).await.unwrap();
    assert_eq!(
        rows,
        vec![
            suggestion("/a", "/b"),
            suggestion("/a", "/c"),
            suggestion("/c", "/a")
        ]
    );

    let entries = store.load_entries(&job).await.unwrap();
    let units: Vec<u64> = entries.iter().map(|e| e.unit).collect();
    assert_eq!(units, vec![0, 1, 2]);
}

#[tokio::test]
async fn unknown_job_loads_empty() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).await.unwrap();
    assert!(store.load(&id("never")).await.unwrap().is_empty());
}

#[tokio::test]
async fn reopened_store_continues_count_from_disk() {
    let dir = tempdir().unwrap();
    let job = id("restart");
    {
        let store = CheckpointStore::open(dir.path()).await.unwrap();
        store.append(&job, 0, &[suggestion("/x", "/y")]).await.unwrap();
        store.append(&job, 1, &[suggestion("/y", "/x")]).await.unwrap();
    }
    let store = CheckpointStore::open(dir.path()).await.unwrap();
    let n = store.append(&job, 2, &[suggestion("/z", "/x")]).await.unwrap();
    assert_eq!(n, 3);
    assert_eq!(store.load(&job).await.unwrap().len(), 3);
}

#[tokio::test]
async fn torn_tail_is_ignored_then_truncated() {
    let dir = tempdir().unwrap();
    let job = id("torn");
    {
        let store = CheckpointStore::open(dir.path()).await.unwrap();
        store.append(&job, 0, &[suggestion("/a", "/b")]).await.unwrap();
    }
    // Simulate a crash halfway through writing the next line.
    let path = dir.path().join("torn.results.jsonl");
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(b"3f2a9c {\"unit\":1,\"rows\":[{\"sou").unwrap();
    drop(f);

    let store = CheckpointStore::open(dir.path()).await.unwrap();
    assert_eq!(store.load(&job).await.unwrap().len(), 1);

    let n = store.append(&job, 1, &[suggestion("/b", "/a")]).await.unwrap();
    assert_eq!(n, 2);
    let entries = store.load_entries(&job).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].unit, 1);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.ends_with('\n'));
    assert_eq!(contents.lines().count(), 2);
}

#[tokio::test]
async fn checksum_mismatch_is_corrupt() {
    let dir = tempdir().unwrap();
    let job = id("tampered");
    let store = CheckpointStore::open(dir.path()).await.unwrap();
    store.append(&job, 0, &[suggestion("/a", "/b")]).await.unwrap();
    store.append(&job, 1, &[suggestion("/b", "/c")]).await.unwrap();

    let path = dir.path().join("tampered.results.jsonl");
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replacen("/b", "/Z", 1)).unwrap();

    let err = store.load(&job).await.unwrap_err();
    match err {
        JobError::Corrupt { reason, .. } => assert!(reason.contains("line 1"), "{reason}"),
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

#[tokio::test]
async fn reprocessed_unit_keeps_latest_attempt() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).await.unwrap();
    let job = id("again");

    store.append(&job, 0, &[suggestion("/p0", "/a")]).await.unwrap();
    store.append(&job, 1, &[suggestion("/p1", "/old")]).await.unwrap();
    // Crash before progress was saved; unit 1 runs again after resume.
    let n = store
        .append(&job, 1, &[suggestion("/p1", "/new"), suggestion("/p1", "/new2")])
        .await
        .unwrap();
    assert_eq!(n, 4);

    assert_eq!(store.load_entries(&job).await.unwrap().len(), 3);
    assert_eq!(
        store.load(&job).await.unwrap(),
        vec![
            suggestion("/p0", "/a"),
            suggestion("/p1", "/new"),
            suggestion("/p1", "/new2")
        ]
    );
}

#[test]
fn dedup_positions_unit_at_latest_entry() {
    let entry = |unit, tag: &str| CheckpointEntry {
        unit,
        rows: vec![ResultRow::new().with("tag", tag)],
    };
    let rows = dedup_by_unit(vec![entry(0, "a"), entry(1, "b"), entry(0, "c"), entry(2, "d")]);
    let tags: Vec<&str> = rows
        .iter()
        .map(|r| r.get("tag").and_then(|v| v.as_str()).unwrap())
        .collect();
    assert_eq!(tags, vec!["b", "c", "d"]);
}
