//! Recovery decorator
//!
//! A failed operation marks the log dirty; the next operation first cycles
//! the wrapped log through `stop()` and `start()`. Recovery is driven by
//! callers only, so a broken log costs at most one restart attempt per
//! operation and never a background retry loop.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::error::{LogError, Result};

use super::{ErrorCallback, IterOptions, LogCore, LogState, RecordIter, Seq};

/// Self-restarting wrapper around a [`LogCore`]
pub struct RecoveringLog<L> {
    inner: L,
    dirty: AtomicBool,
    /// Lets exactly one of several concurrent callers perform a recovery
    gate: Mutex<()>,
    on_error: Option<ErrorCallback>,
    state: RwLock<LogState>,
}

impl<L: LogCore> RecoveringLog<L> {
    pub fn new(inner: L) -> Self {
        let state = LogState::of(&inner);
        Self {
            inner,
            dirty: AtomicBool::new(false),
            gate: Mutex::new(()),
            on_error: None,
            state: RwLock::new(state),
        }
    }

    /// Report failed recoveries to `callback`
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// The wrapped log
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Whether the next operation will restart the wrapped log first
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn run<T>(&self, op: impl FnOnce(&L) -> Result<T>) -> Result<T> {
        self.recover_if_dirty()?;

        match op(&self.inner) {
            Ok(value) => {
                *self.state.write() = LogState::of(&self.inner);
                Ok(value)
            }
            Err(e) => {
                tracing::debug!("Operation failed, scheduling restart: {}", e);
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    fn recover_if_dirty(&self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }

        let _gate = self.gate.lock();
        // Another caller may have recovered while we waited
        if !self.is_dirty() {
            return Ok(());
        }

        match self.inner.stop().and_then(|_| self.inner.start()) {
            Ok(()) => {
                *self.state.write() = LogState::of(&self.inner);
                self.dirty.store(false, Ordering::Release);
                tracing::info!("Log restarted at seq {}", self.inner.seq());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Log restart failed: {}", e);
                if let Some(callback) = &self.on_error {
                    callback(&e);
                }
                Err(LogError::RecoveryFailed(e.to_string()))
            }
        }
    }
}

impl<L: LogCore> LogCore for RecoveringLog<L> {
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
