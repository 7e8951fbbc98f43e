//! Batching decorator
//!
//! Coalesces closely timed `append` calls into a single `append_batch`.
//!
//! ## Flow
//! ```text
//! append ─┐
//! append ─┼─► job queue ─► worker ─► buffer ──(interval | max_records)──► append_batch
//! append ─┘                  │                                              │
//! truncate/start/... ────────┘ flush buffer first, then run ◄── seq per caller ┘
//! ```
//!
//! Every operation funnels through one worker thread, so the worker is the
//! serialization point: buffered appends always land before any operation
//! issued after them.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::BatchConfig;
use crate::error::{LogError, Result};

use super::{IterOptions, LogCore, RecordIter, Seq};

type Reply<T> = Sender<Result<T>>;

enum Job<L> {
    Append {
        record: Bytes,
        expected_seq: Option<Seq>,
        reply: Reply<Seq>,
    },
    Exec(Box<dyn FnOnce(&L) + Send>),
}

struct PendingAppend {
    record: Bytes,
    expected_seq: Option<Seq>,
    reply: Reply<Seq>,
}

/// Append-coalescing wrapper around a [`LogCore`]
pub struct BatchingLog<L> {
    inner: Arc<L>,
    jobs: Option<Sender<Job<L>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<L: LogCore + 'static> BatchingLog<L> {
    /// Wrap `inner`, spawning the batching worker
    pub fn new(inner: L, config: BatchConfig) -> Self {
        let inner = Arc::new(inner);
        let (tx, rx) = channel::unbounded();

        let log = Arc::clone(&inner);
        let worker = std::thread::Builder::new()
            .name("seqlog-batcher".to_string())
            .spawn(move || Batcher::new(log, config).run(rx))
            .ok();

        if worker.is_none() {
            tracing::error!("Failed to spawn batching worker");
        }

        Self {
            inner,
            jobs: worker.as_ref().map(|_| tx),
            worker: Mutex::new(worker),
        }
    }

    /// The wrapped log
    pub fn inner(&self) -> &L {
        &self.inner
    }

    fn send(&self, job: Job<L>) -> Result<()> {
        let jobs = self.jobs.as_ref().ok_or(LogError::Closed)?;
        jobs.send(job).map_err(|_| LogError::Closed)
    }

    /// Run `op` on the worker after any buffered appends are flushed
    fn exec<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&L) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        self.send(Job::Exec(Box::new(move |log: &L| {
            let _ = tx.send(op(log));
        })))?;
        rx.recv().map_err(|_| LogError::Closed)?
    }
}

impl<L> Drop for BatchingLog<L> {
    fn drop(&mut self) {
        // Closing the queue makes the worker flush and exit
        self.jobs.take();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl<L: LogCore + 'static> LogCore for BatchingLog<L> {
    fn start(&self) -> Result<()> {
        self.exec(|log| log.start())
    }

    fn stop(&self) -> Result<()> {
        self.exec(|log| log.stop())
    }

    fn append(&self, record: Bytes, expected_seq: Option<Seq>) -> Result<Seq> {
        let (tx, rx) = channel::bounded(1);
        self.send(Job::Append {
            record,
            expected_seq,
            reply: tx,
        })?;
        rx.recv().map_err(|_| LogError::Closed)?
    }

    fn append_batch(&self, records: Vec<Bytes>, expected_seq: Option<Seq>) -> Result<Seq> {
        self.exec(move |log| log.append_batch(records, expected_seq))
    }

    fn truncate(&self, target_seq: Seq) -> Result<()> {
        self.exec(move |log| log.truncate(target_seq))
    }

    fn iterate(&self, from_seq: Seq, options: IterOptions) -> Result<RecordIter> {
        self.exec(move |log| log.iterate(from_seq, options))
    }

    fn delete(&self) -> Result<()> {
        self.exec(|log| log.delete())
    }

    fn seq(&self) -> Seq {
        self.inner.seq()
    }

    fn head(&self) -> Option<Bytes> {
        self.inner.head()
    }
}

/// Worker side: owns the buffer of pending appends
struct Batcher<L> {
    log: Arc<L>,
    config: BatchConfig,
    buffer: Vec<PendingAppend>,
    deadline: Option<Instant>,
}

impl<L: LogCore> Batcher<L> {
    fn new(log: Arc<L>, config: BatchConfig) -> Self {
        Self {
            log,
            config,
            buffer: Vec::with_capacity(config.max_records),
            deadline: None,
        }
    }

    fn run(mut self, jobs: Receiver<Job<L>>) {
        loop {
            let job = match self.deadline {
                None => match jobs.recv() {
                    Ok(job) => job,
                    Err(_) => break,
                },
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match jobs.recv_timeout(wait) {
                        Ok(job) => job,
                        Err(RecvTimeoutError::Timeout) => {
                            self.flush();
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            };

            match job {
                Job::Append {
                    record,
                    expected_seq,
                    reply,
                } => {
                    if self.buffer.is_empty() {
                        self.deadline = Some(Instant::now() + self.config.interval());
                    }
                    self.buffer.push(PendingAppend {
                        record,
                        expected_seq,
                        reply,
                    });
                    if self.buffer.len() >= self.config.max_records {
                        self.flush();
                    }
                }
                Job::Exec(op) => {
                    self.flush();
                    op(self.log.as_ref());
                }
            }
        }

        self.flush();
        tracing::debug!("Batching worker stopped");
    }

    /// Issue buffered appends as one batch
    ///
    /// Each append is resolved with the seq it would have received had the
    /// appends run one at a time: a stale `expected_seq` fails just that
    /// caller and does not consume a seq.
    fn flush(&mut self) {
        self.deadline = None;
        if self.buffer.is_empty() {
            return;
        }

        let base = self.log.seq();
        let mut projected = base;
        let mut guarded = false;
        let mut accepted = Vec::with_capacity(self.buffer.len());

        for pending in self.buffer.drain(..) {
            match pending.expected_seq {
                Some(expected) if expected != projected => {
                    let _ = pending.reply.send(Err(LogError::SequenceConflict {
                        expected,
                        actual: projected,
                    }));
                }
                Some(_) => {
                    guarded = true;
                    projected += 1;
                    accepted.push(pending);
                }
                None => {
                    projected += 1;
                    accepted.push(pending);
                }
            }
        }

        if accepted.is_empty() {
            return;
        }

        let records: Vec<Bytes> = accepted.iter().map(|p| p.record.clone()).collect();
        let expected = if guarded { Some(base) } else { None };
        tracing::trace!("Flushing batch of {} appends at seq {}", records.len(), base);

        match self.log.append_batch(records, expected) {
            Ok(first) => {
                for (i, pending) in accepted.into_iter().enumerate() {
                    let _ = pending.reply.send(Ok(first + i as Seq));
                }
            }
            Err(e) => {
                tracing::debug!("Batch of {} appends failed: {}", accepted.len(), e);
                for pending in accepted {
                    let _ = pending.reply.send(Err(e.replicate()));
                }
            }
        }
    }
}
