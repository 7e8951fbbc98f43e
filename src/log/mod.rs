//! Log Module
//!
//! The storage contract every log implementation satisfies, plus the
//! decorators layered over it.
//!
//! ## Decorator Chain
//! ```text
//!   caller
//!     │
//!     ▼
//! ┌──────────────┐   coalesce appends into append_batch
//! │ BatchingLog  │   (optional, dedicated worker thread)
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐   failure → dirty; next call does stop()+start()
//! │ RecoveringLog│
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐   one operation in flight, FIFO admission order
//! │  SerialLog   │
//! └──────┬───────┘
//!        ▼
//!    LogCore (MemoryLog, LogClient, external storage)
//! ```
//!
//! Every layer implements [`LogCore`] itself, so the chain is the same
//! whether the innermost log is local storage or a remote log reached
//! through [`crate::network::LogClient`].

mod batching;
mod chain;
mod memory;
mod recovery;
mod serial;

pub use batching::BatchingLog;
pub use chain::{decorate, ChainConfig, ErrorCallback};
pub use memory::MemoryLog;
pub use recovery::RecoveringLog;
pub use serial::SerialLog;

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{LogError, Result};

/// Sequence number of a log entry; `EMPTY_SEQ` means the log is empty
pub type Seq = i64;

/// Sequence number of an empty log
pub const EMPTY_SEQ: Seq = -1;

/// Lazily produced `(seq, record)` pairs, in seq order
pub type RecordIter = Box<dyn Iterator<Item = Result<(Seq, Bytes)>> + Send>;

/// Snapshot of a log's observable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogState {
    /// Seq of the last appended record
    pub seq: Seq,

    /// The last appended record
    pub head: Option<Bytes>,
}

impl Default for LogState {
    fn default() -> Self {
        Self {
            seq: EMPTY_SEQ,
            head: None,
        }
    }
}

impl LogState {
    /// Read the current state of a log
    pub fn of<L: LogCore + ?Sized>(log: &L) -> Self {
        Self {
            seq: log.seq(),
            head: log.head(),
        }
    }
}

/// Options for [`LogCore::iterate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct IterOptions {
    /// Stop after this many records
    pub limit: Option<usize>,
}

/// Operations every log storage implementation must provide
///
/// Implementations do not have to tolerate concurrent calls meaningfully:
/// admission control is the job of [`SerialLog`]. They must be `Sync` so a
/// handle can be shared, typically by keeping their state behind a lock.
pub trait LogCore: Send + Sync {
    /// Bring the log to an operable state (no-op if already started)
    fn start(&self) -> Result<()>;

    /// Release resources (safe to call repeatedly)
    fn stop(&self) -> Result<()>;

    /// Append one record, returning its seq
    ///
    /// `expected_seq`, when given, must equal the current seq or the append
    /// fails with `SequenceConflict`.
    fn append(&self, record: Bytes, expected_seq: Option<Seq>) -> Result<Seq>;

    /// Append records atomically, returning the seq of the first one
    ///
    /// Afterwards the log's seq is `first + records.len() - 1`.
    fn append_batch(&self, records: Vec<Bytes>, expected_seq: Option<Seq>) -> Result<Seq>;

    /// Discard every record with a seq greater than `target_seq`
    ///
    /// `-1` empties the log; targets at or beyond the current seq are no-ops.
    fn truncate(&self, target_seq: Seq) -> Result<()>;

    /// Produce records from `from_seq` onward
    fn iterate(&self, from_seq: Seq, options: IterOptions) -> Result<RecordIter> {
        let _ = (from_seq, options);
        Err(LogError::Unsupported("iterate"))
    }

    /// Irreversibly remove the log's storage
    fn delete(&self) -> Result<()>;

    /// Seq of the last appended record
    fn seq(&self) -> Seq;

    /// The last appended record
    fn head(&self) -> Option<Bytes>;
}

impl<L: LogCore + ?Sized> LogCore for Arc<L> {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn stop(&self) -> Result<()> {
        (**self).stop()
    }

    fn append(&self, record: Bytes, expected_seq: Option<Seq>) -> Result<Seq> {
        (**self).append(record, expected_seq)
    }

    fn append_batch(&self, records: Vec<Bytes>, expected_seq: Option<Seq>) -> Result<Seq> {
        (**self).append_batch(records, expected_seq)
    }

    fn truncate(&self, target_seq: Seq) -> Result<()> {
        (**self).truncate(target_seq)
    }

    fn iterate(&self, from_seq: Seq, options: IterOptions) -> Result<RecordIter> {
        (**self).iterate(from_seq, options)
    }

    fn delete(&self) -> Result<()> {
        (**self).delete()
    }

    fn seq(&self) -> Seq {
        (**self).seq()
    }

    fn head(&self) -> Option<Bytes> {
        (**self).head()
    }
}

/// Creates logs for the server when a path is first registered
pub trait LogFactory: Send + Sync {
    /// Open (or create) the log at `path` with constructor arguments `args`
    fn open(&self, path: &str, args: &[String]) -> Result<Arc<dyn LogCore>>;
}

impl<F> LogFactory for F
where
    F: Fn(&str, &[String]) -> Result<Arc<dyn LogCore>> + Send + Sync,
{
    fn open(&self, path: &str, args: &[String]) -> Result<Arc<dyn LogCore>> {
        self(path, args)
    }
}
