//! Serializing decorator
//!
//! Admits at most one operation at a time and runs them in the order they
//! were issued.

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::Result;

use super::{IterOptions, LogCore, LogState, RecordIter, Seq};

/// Single-flight wrapper around a [`LogCore`]
///
/// ## Concurrency:
/// - Each call draws a ticket under `queue`; tickets are served strictly in
///   draw order, so execution order equals admission order
/// - A failed operation still hands the turn to the next ticket; only its
///   own caller sees the error
/// - `state` caches seq/head after every successful operation, so readers
///   never wait behind an in-flight operation
pub struct SerialLog<L> {
    inner: L,
    queue: Mutex<Tickets>,
    turn: Condvar,
    state: RwLock<LogState>,
}

#[derive(Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// Releases the turn on every exit path, including unwinding
struct Turn<'a, L> {
    log: &'a SerialLog<L>,
}

impl<L> Drop for Turn<'_, L> {
    fn drop(&mut self) {
        let mut queue = self.log.queue.lock();
        queue.serving += 1;
        drop(queue);
        self.log.turn.notify_all();
    }
}

impl<L: LogCore> SerialLog<L> {
    pub fn new(inner: L) -> Self {
        let state = LogState::of(&inner);
        Self {
            inner,
            queue: Mutex::new(Tickets::default()),
            turn: Condvar::new(),
            state: RwLock::new(state),
        }
    }

    /// The wrapped log
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Number of operations admitted but not yet finished
    pub fn queued(&self) -> u64 {
        let queue = self.queue.lock();
        queue.next - queue.serving
    }

    /// Wait for this caller's turn, run `op`, then refresh cached state
    fn run<T>(&self, op: impl FnOnce(&L) -> Result<T>) -> Result<T> {
        {
            let mut queue = self.queue.lock();
            let ticket = queue.next;
            queue.next += 1;
            while queue.serving != ticket {
                self.turn.wait(&mut queue);
            }
        }
        let _turn = Turn { log: self };

        let result = op(&self.inner);
        if result.is_ok() {
            *self.state.write() = LogState::of(&self.inner);
        }
        result
    }
}

impl<L: LogCore> LogCore for SerialLog<L> {
    fn start(&self) -> Result<()> {
        self.run(|log| log.start())
    }

    fn stop(&self) -> Result<()> {
        self.run(|log| log.stop())
    }

    fn append(&self, record: Bytes, expected_seq: Option<Seq>) -> Result<Seq> {
        self.run(|log| log.append(record, expected_seq))
    }

    fn append_batch(&self, records: Vec<Bytes>, expected_seq: Option<Seq>) -> Result<Seq> {
        self.run(|log| log.append_batch(records, expected_seq))
    }

    fn truncate(&self, target_seq: Seq) -> Result<()> {
        self.run(|log| log.truncate(target_seq))
    }

    fn iterate(&self, from_seq: Seq, options: IterOptions) -> Result<RecordIter> {
        self.run(|log| log.iterate(from_seq, options))
    }

    fn delete(&self) -> Result<()> {
        self.run(|log| log.delete())
    }

    fn seq(&self) -> Seq {
        self.state.read().seq
    }

    fn head(&self) -> Option<Bytes> {
        self.state.read().head.clone()
    }
}
