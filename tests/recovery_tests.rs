//! Tests for crash recovery
//!
//! These tests verify:
//! - Torn tails (partial header / partial body) keep the valid prefix
//! - The active segment is cut back to its valid prefix before appends
//! - Recovery applies tombstones across segments
//! - Leftovers of an interrupted compaction are handled on open

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use caskkv::config::Config;
use caskkv::engine::Engine;
use caskkv::record;
use caskkv::recovery;
use caskkv::segment::segment_path;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open(dir: &Path) -> Engine {
    Engine::open(Config::builder().data_dir(dir).build()).unwrap()
}

fn active_path(dir: &Path) -> PathBuf {
    segment_path(dir, 1)
}

/// Append raw bytes behind the engine's back (simulates a torn write)
fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn write_segment(dir: &Path, id: u64, records: &[(&str, &str)]) {
    let mut bytes = Vec::new();
    for (key, value) in records {
        bytes.extend_from_slice(&record::encode(1, key.as_bytes(), value.as_bytes()).unwrap());
    }
    fs::write(segment_path(dir, id), bytes).unwrap();
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_recover_partial_header_at_tail() {
    let temp = TempDir::new().unwrap();
    {
        let mut engine = open(temp.path());
        engine.put(b"k1", b"v1").unwrap();
        engine.put(b"k2", b"v2").unwrap();
        engine.close().unwrap();
    }

    let torn = record::encode(1, b"k3", b"v3").unwrap();
    append_raw(&active_path(temp.path()), &torn[..10]);

    let mut engine = open(temp.path());

    assert_eq!(engine.get(b"k1"), Some(b"v1".to_vec()));
    assert_eq!(engine.get(b"k2"), Some(b"v2".to_vec()));
    assert_eq!(engine.get(b"k3"), None);
    assert_eq!(engine.recovery_result().truncated_segments, vec![1]);
    assert_eq!(engine.recovery_result().bytes_discarded, 10);
}

#[test]
fn test_recover_partial_body_at_tail() {
    let temp = TempDir::new().unwrap();
    {
        let mut engine = open(temp.path());
        engine.put(b"k1", b"v1").unwrap();
        engine.close().unwrap();
    }

    let torn = record::encode(1, b"k2", b"a longer value").unwrap();
    append_raw(&active_path(temp.path()), &torn[..torn.len() - 3]);

    let mut engine = open(temp.path());

    assert_eq!(engine.get(b"k1"), Some(b"v1".to_vec()));
    assert!(!engine.contains_key(b"k2"));
    assert!(engine.recovery_result().was_truncated());
}

#[test]
fn test_writes_after_torn_tail_survive_next_recovery() {
    let temp = TempDir::new().unwrap();
    {
        let mut engine = open(temp.path());
        engine.put(b"k1", b"v1").unwrap();
        engine.close().unwrap();
    }
    append_raw(&active_path(temp.path()), &[0xAB; 9]);

    {
        let mut engine = open(temp.path());
        // The torn bytes are gone, so this record lands on a clean boundary
        assert_eq!(engine.stats().active_segment_size, 20);
        engine.put(b"k2", b"v2").unwrap();
        engine.close().unwrap();
    }

    let mut engine = open(temp.path());
    assert_eq!(engine.get(b"k1"), Some(b"v1".to_vec()));
    assert_eq!(engine.get(b"k2"), Some(b"v2".to_vec()));
    assert!(!engine.recovery_result().was_truncated());
}

#[test]
fn test_torn_sealed_segment_is_left_alone() {
    let temp = TempDir::new().unwrap();
    write_segment(temp.path(), 1, &[("a", "1")]);
    append_raw(&segment_path(temp.path(), 1), &[0u8; 5]);
    write_segment(temp.path(), 2, &[("b", "2")]);

    let mut engine = open(temp.path());

    assert_eq!(engine.get(b"a"), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b"), Some(b"2".to_vec()));
    assert_eq!(engine.stats().active_segment_id, 2);
    assert_eq!(fs::metadata(segment_path(temp.path(), 1)).unwrap().len(), 23);
    // The garbage counts as reclaimable
    assert_eq!(engine.stats().dead_bytes, 5);
}

// =============================================================================
// Cross-Segment Replay Tests
// =============================================================================

#[test]
fn test_tombstone_in_later_segment_wins() {
    let temp = TempDir::new().unwrap();
    write_segment(temp.path(), 1, &[("k", "old"), ("keep", "yes")]);
    write_segment(temp.path(), 2, &[("k", "")]);
    write_segment(temp.path(), 3, &[("other", "1")]);

    let mut engine = open(temp.path());

    assert_eq!(engine.get(b"k"), None);
    assert_eq!(engine.get(b"keep"), Some(b"yes".to_vec()));
    assert_eq!(engine.get(b"other"), Some(b"1".to_vec()));
    assert_eq!(engine.stats().segment_count, 3);
}

#[test]
fn test_foreign_files_are_ignored() {
    let temp = TempDir::new().unwrap();
    write_segment(temp.path(), 1, &[("a", "1")]);
    fs::write(temp.path().join("README"), b"not a segment").unwrap();

    let mut engine = open(temp.path());

    assert_eq!(engine.get(b"a"), Some(b"1".to_vec()));
    assert_eq!(engine.recovery_result().segments_scanned, 1);
}

// =============================================================================
// Interrupted Compaction Tests
// =============================================================================

#[test]
fn test_crash_before_install_discards_scratch_file() {
    let temp = TempDir::new().unwrap();
    write_segment(temp.path(), 1, &[("a", "1"), ("a", "2")]);
    // Half-written compaction output
    fs::write(temp.path().join("compact.tmp"), b"partial").unwrap();

    let mut engine = open(temp.path());

    assert!(!temp.path().join("compact.tmp").exists());
    assert_eq!(engine.get(b"a"), Some(b"2".to_vec()));
}

#[test]
fn test_crash_after_install_before_removal() {
    let temp = TempDir::new().unwrap();
    // Old segments, including a deleted key
    write_segment(temp.path(), 1, &[("a", "1"), ("gone", "x"), ("b", "old")]);
    write_segment(temp.path(), 2, &[("gone", ""), ("b", "new")]);
    // Installed compaction output that still has the old files beside it
    write_segment(temp.path(), 3, &[("a", "1"), ("b", "new")]);

    let mut engine = open(temp.path());

    assert_eq!(engine.get(b"a"), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b"), Some(b"new".to_vec()));
    assert_eq!(engine.get(b"gone"), None);
    assert_eq!(engine.stats().active_segment_id, 3);

    // The next compaction finishes the job
    let stats = engine.compact().unwrap();
    assert_eq!(stats.segments_removed, 3);
    let (_, result) = recovery::verify(temp.path()).unwrap();
    assert_eq!(result.segments_scanned, 1);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_files() {
    let temp = TempDir::new().unwrap();
    write_segment(temp.path(), 1, &[("a", "1")]);
    append_raw(&segment_path(temp.path(), 1), &[1, 2, 3]);

    let (keydir, result) = recovery::verify(temp.path()).unwrap();

    assert_eq!(keydir.len(), 1);
    assert_eq!(result.bytes_discarded, 3);
    assert_eq!(fs::metadata(segment_path(temp.path(), 1)).unwrap().len(), 21);
}
