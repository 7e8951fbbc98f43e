//! Tests for the in-memory log
//!
//! These tests verify:
//! - Start/stop gating of operations
//! - Seq assignment for append and append_batch
//! - expected_seq guards
//! - Truncation, including to empty and re-append afterwards
//! - Iteration through the checksummed index
//! - Damaged index entries surface as errors

use bytes::Bytes;
use seqlog::log::{IterOptions, LogCore, MemoryLog};
use seqlog::meta;
use seqlog::{LogError, EMPTY_SEQ};

// =============================================================================
// Helper Functions
// =============================================================================

fn started() -> MemoryLog {
    let log = MemoryLog::new();
    log.start().unwrap();
    log
}

fn rec(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn collect(log: &MemoryLog, from: i64, limit: Option<usize>) -> Vec<(i64, Bytes)> {
    log.iterate(from, IterOptions { limit })
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_new_log_is_empty() {
    let log = MemoryLog::new();

    assert!(!log.is_started());
    assert_eq!(log.seq(), EMPTY_SEQ);
    assert_eq!(log.head(), None);
}

#[test]
fn test_operations_require_start() {
    let log = MemoryLog::new();

    assert!(matches!(log.append(rec("a"), None), Err(LogError::NotOpen)));
    assert!(matches!(log.truncate(-1), Err(LogError::NotOpen)));

    log.start().unwrap();
    assert_eq!(log.append(rec("a"), None).unwrap(), 0);

    log.stop().unwrap();
    log.stop().unwrap();
    assert!(matches!(log.append(rec("b"), None), Err(LogError::NotOpen)));

    // Contents survive a restart
    log.start().unwrap();
    assert_eq!(log.seq(), 0);
    assert_eq!(log.head(), Some(rec("a")));
}

#[test]
fn test_delete_resets() {
    let log = started();
    log.append(rec("a"), None).unwrap();

    log.delete().unwrap();

    assert!(!log.is_started());
    assert_eq!(log.seq(), EMPTY_SEQ);
    assert_eq!(log.head(), None);
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_assigns_consecutive_seqs() {
    let log = started();

    for i in 0..10 {
        assert_eq!(log.append(rec(&format!("r{}", i)), None).unwrap(), i);
    }

    assert_eq!(log.seq(), 9);
    assert_eq!(log.head(), Some(rec("r9")));
    assert_eq!(log.get(4).unwrap(), Some(rec("r4")));
    assert_eq!(log.get(10).unwrap(), None);
}

#[test]
fn test_append_batch_returns_first_seq() {
    let log = started();
    log.append(rec("a"), None).unwrap();

    let first = log
        .append_batch(vec![rec("b"), rec("c"), rec("d")], None)
        .unwrap();

    assert_eq!(first, 1);
    assert_eq!(log.seq(), 3);
    assert_eq!(log.head(), Some(rec("d")));
}

#[test]
fn test_expected_seq_guard() {
    let log = started();

    assert_eq!(log.append(rec("a"), Some(EMPTY_SEQ)).unwrap(), 0);
    assert_eq!(log.append(rec("b"), Some(0)).unwrap(), 1);

    match log.append(rec("c"), Some(0)) {
        Err(LogError::SequenceConflict { expected, actual }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("Expected conflict, got {:?}", other),
    }

    assert!(matches!(
        log.append_batch(vec![rec("c")], Some(5)),
        Err(LogError::SequenceConflict { .. })
    ));
    assert_eq!(log.seq(), 1);
}

#[test]
fn test_empty_records_are_entries() {
    let log = started();

    log.append(Bytes::new(), None).unwrap();
    log.append(rec("x"), None).unwrap();

    assert_eq!(log.get(0).unwrap(), Some(Bytes::new()));
    assert_eq!(log.get(1).unwrap(), Some(rec("x")));
}

// =============================================================================
// Truncate Tests
// =============================================================================

#[test]
fn test_truncate_then_append() {
    let log = started();
    for s in ["a", "b", "c", "d"] {
        log.append(rec(s), None).unwrap();
    }

    log.truncate(1).unwrap();
    assert_eq!(log.seq(), 1);
    assert_eq!(log.head(), Some(rec("b")));

    // The next append reuses the discarded seq
    assert_eq!(log.append(rec("e"), None).unwrap(), 2);
    assert_eq!(
        collect(&log, 0, None),
        vec![(0, rec("a")), (1, rec("b")), (2, rec("e"))]
    );
}

#[test]
fn test_truncate_to_empty() {
    let log = started();
    log.append(rec("a"), None).unwrap();
    log.append(rec("b"), None).unwrap();

    log.truncate(EMPTY_SEQ).unwrap();

    assert_eq!(log.seq(), EMPTY_SEQ);
    assert_eq!(log.head(), None);
    assert_eq!(log.append(rec("c"), None).unwrap(), 0);
}

#[test]
fn test_truncate_beyond_end_is_noop() {
    let log = started();
    log.append(rec("a"), None).unwrap();

    log.truncate(0).unwrap();
    log.truncate(100).unwrap();

    assert_eq!(log.seq(), 0);
    assert_eq!(log.head(), Some(rec("a")));
}

#[test]
fn test_truncate_below_empty_rejected() {
    let log = started();
    assert!(matches!(log.truncate(-2), Err(LogError::InvalidRequest(_))));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iterate_from_and_limit() {
    let log = started();
    for i in 0..5 {
        log.append(rec(&format!("r{}", i)), None).unwrap();
    }

    let all = collect(&log, 0, None);
    assert_eq!(all.len(), 5);
    assert_eq!(all[4], (4, rec("r4")));

    let tail = collect(&log, 3, None);
    assert_eq!(tail, vec![(3, rec("r3")), (4, rec("r4"))]);

    let limited = collect(&log, 1, Some(2));
    assert_eq!(limited, vec![(1, rec("r1")), (2, rec("r2"))]);

    assert!(collect(&log, 9, None).is_empty());
}

#[test]
fn test_iterate_is_a_snapshot() {
    let log = started();
    log.append(rec("a"), None).unwrap();

    let iter = log.iterate(0, IterOptions::default()).unwrap();
    log.append(rec("b"), None).unwrap();

    assert_eq!(iter.count(), 1);
}

// =============================================================================
// Index Damage Tests
// =============================================================================

#[test]
fn test_damaged_index_entry_detected() {
    let log = started();
    log.append(rec("a"), None).unwrap();
    log.append(rec("b"), None).unwrap();

    let mut raw = log.index_entry(1).unwrap();
    raw[20] ^= 0x01;
    assert!(log.overwrite_index_entry(1, raw));

    assert!(matches!(log.get(1), Err(LogError::CorruptRecord { .. })));
    assert_eq!(log.get(0).unwrap(), Some(rec("a")));

    let results: Vec<_> = log.iterate(0, IterOptions::default()).unwrap().collect();
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(LogError::CorruptRecord { .. })));

    // Truncating needs the first discarded entry's offset
    assert!(matches!(log.truncate(0), Err(LogError::CorruptRecord { .. })));
}

#[test]
fn test_overflowing_index_entry_is_malformed() {
    let log = started();
    log.append(rec("a"), None).unwrap();
    log.append(rec("b"), None).unwrap();

    // Correctly hashed, but offset + length does not fit in a u64
    assert!(log.overwrite_index_entry(1, meta::encode(1, u64::MAX, 2)));

    assert!(matches!(log.get(1), Err(LogError::MalformedRecord { .. })));
    let results: Vec<_> = log.iterate(0, IterOptions::default()).unwrap().collect();
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(LogError::MalformedRecord { .. })));
}

#[test]
fn test_out_of_bounds_index_entry_is_malformed() {
    let log = started();
    log.append(rec("a"), None).unwrap();

    assert!(log.overwrite_index_entry(0, meta::encode(0, 0, 1000)));

    assert!(matches!(log.get(0), Err(LogError::MalformedRecord { .. })));
}

#[test]
fn test_overwrite_missing_entry() {
    let log = started();
    assert!(!log.overwrite_index_entry(0, [0u8; 32]));
    assert!(!log.overwrite_index_entry(-1, [0u8; 32]));
    assert!(log.index_entry(0).is_none());
}
