//! Tests for the recovery decorator
//!
//! These tests verify:
//! - A failure marks the log dirty and is returned unchanged
//! - The next operation restarts the wrapped log first
//! - A failed restart reports through the error callback and
//!   returns RecoveryFailed
//! - Cached seq/head are refreshed after a restart

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use seqlog::log::{ErrorCallback, LogCore, MemoryLog, RecoveringLog, SerialLog};
use seqlog::{LogError, Result, Seq};

// =============================================================================
// Helper Functions
// =============================================================================

/// In-memory log with switchable failures
#[derive(Default)]
struct FlakyLog {
    inner: MemoryLog,
    fail_appends: AtomicBool,
    fail_starts: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FlakyLog {
    fn started() -> Self {
        let log = Self::default();
        log.inner.start().unwrap();
        log
    }
}

impl LogCore for FlakyLog {
    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_starts.load(Ordering::SeqCst) {
            return Err(LogError::Connection("storage offline".to_string()));
        }
        self.inner.start()
    }

    fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.stop()
    }

    fn append(&self, record: Bytes, expected_seq: Option<Seq>) -> Result<Seq> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LogError::Connection("write failed".to_string()));
        }
        self.inner.append(record, expected_seq)
    }

    fn append_batch(&self, records: Vec<Bytes>, expected_seq: Option<Seq>) -> Result<Seq> {
        self.inner.append_batch(records, expected_seq)
    }

    fn truncate(&self, target_seq: Seq) -> Result<()> {
        self.inner.truncate(target_seq)
    }

    fn delete(&self) -> Result<()> {
        self.inner.delete()
    }

    fn seq(&self) -> Seq {
        self.inner.seq()
    }

    fn head(&self) -> Option<Bytes> {
        self.inner.head()
    }
}

fn rec(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_failure_marks_dirty() {
    let log = RecoveringLog::new(FlakyLog::started());
    log.append(rec("a"), None).unwrap();
    assert!(!log.is_dirty());

    log.inner().fail_appends.store(true, Ordering::SeqCst);
    assert!(matches!(
        log.append(rec("b"), None),
        Err(LogError::Connection(_))
    ));
    assert!(log.is_dirty());
    assert_eq!(log.inner().stops.load(Ordering::SeqCst), 0);
}

#[test]
fn test_next_operation_restarts() {
    let log = RecoveringLog::new(FlakyLog::started());
    log.append(rec("a"), None).unwrap();

    log.inner().fail_appends.store(true, Ordering::SeqCst);
    let _ = log.append(rec("b"), None);
    log.inner().fail_appends.store(false, Ordering::SeqCst);

    assert_eq!(log.append(rec("c"), None).unwrap(), 1);
    assert!(!log.is_dirty());
    assert_eq!(log.inner().stops.load(Ordering::SeqCst), 1);
    assert_eq!(log.inner().starts.load(Ordering::SeqCst), 1);
    assert_eq!(log.seq(), 1);
    assert_eq!(log.head(), Some(rec("c")));
}

#[test]
fn test_conflict_also_triggers_restart() {
    let log = RecoveringLog::new(FlakyLog::started());
    log.append(rec("a"), None).unwrap();

    assert!(matches!(
        log.append(rec("b"), Some(5)),
        Err(LogError::SequenceConflict { .. })
    ));
    assert!(log.is_dirty());

    log.truncate(EMPTY).unwrap();
    assert_eq!(log.inner().stops.load(Ordering::SeqCst), 1);
    assert_eq!(log.seq(), EMPTY);
}

const EMPTY: Seq = seqlog::EMPTY_SEQ;

#[test]
fn test_failed_restart_reports_and_stays_dirty() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let callback: ErrorCallback = Arc::new(move |e: &LogError| sink.lock().push(e.to_string()));

    let log = RecoveringLog::new(FlakyLog::started()).with_error_callback(callback);
    log.inner().fail_appends.store(true, Ordering::SeqCst);
    log.inner().fail_starts.store(true, Ordering::SeqCst);
    let _ = log.append(rec("a"), None);

    match log.append(rec("b"), None) {
        Err(LogError::RecoveryFailed(msg)) => assert!(msg.contains("storage offline")),
        other => panic!("Expected RecoveryFailed, got {:?}", other),
    }
    assert!(log.is_dirty());
    assert_eq!(reported.lock().len(), 1);

    // Every later operation retries the restart once
    let _ = log.truncate(EMPTY);
    assert_eq!(reported.lock().len(), 2);
    assert_eq!(log.inner().starts.load(Ordering::SeqCst), 2);

    log.inner().fail_starts.store(false, Ordering::SeqCst);
    log.inner().fail_appends.store(false, Ordering::SeqCst);
    assert_eq!(log.append(rec("c"), None).unwrap(), 0);
    assert!(!log.is_dirty());
    assert_eq!(reported.lock().len(), 2);
}

#[test]
fn test_concurrent_callers_restart_once() {
    let log = Arc::new(RecoveringLog::new(SerialLog::new(FlakyLog::started())));
    log.inner().inner().fail_appends.store(true, Ordering::SeqCst);
    let _ = log.append(rec("a"), None);
    log.inner().inner().fail_appends.store(false, Ordering::SeqCst);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let log = Arc::clone(&log);
            std::thread::spawn(move || log.append(rec(&i.to_string()), None).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(log.inner().inner().stops.load(Ordering::SeqCst), 1);
    assert_eq!(log.seq(), 7);
}
