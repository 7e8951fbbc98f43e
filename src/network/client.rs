//! Log Client
//!
//! Remote [`LogCore`] bound to one log on one server.
//!
//! ## Request Lifecycle
//! ```text
//! caller ──► cid + reply slot into pending table ──► write frame
//!                                                      │
//! reader thread ◄── ack frame ◄────────────────────────┘
//!      │
//!      └─► pending.remove(cid) ─► reply slot ─► caller (or Timeout on deadline)
//! ```
//!
//! If the connection drops, every entry still in the pending table is
//! rejected with `ConnectionClosed` and the client falls back to the
//! not-open, not-connected state.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{LogError, Result};
use crate::log::{IterOptions, LogCore, LogState, RecordIter, Seq};
use crate::protocol::{read_ack, write_request, Ack, Cid, CommandType, Op, Request};

/// Connection state changes observable through [`LogClient::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// A socket to the server was established
    Connected,

    /// `start` completed; the log accepts writes
    Opened,

    /// The socket closed; pending requests were rejected
    Disconnected,
}

/// Client for one log on a remote server
pub struct LogClient {
    addr: String,
    path: String,
    args: Vec<String>,
    config: Config,
    shared: Arc<Shared>,
}

/// State shared with the reader thread
struct Shared {
    link: Mutex<Option<Arc<Link>>>,
    pending: Mutex<HashMap<Cid, Sender<Result<Ack>>>>,
    state: RwLock<LogState>,
    open: AtomicBool,
    next_cid: AtomicU64,
    next_link: AtomicU64,
    subscribers: Mutex<Vec<Sender<ClientEvent>>>,
}

/// One socket to the server
struct Link {
    id: u64,
    writer: Mutex<BufWriter<TcpStream>>,
    stream: TcpStream,
    closed: AtomicBool,
}

impl LogClient {
    /// Create a client for `path` on the server at `addr`
    ///
    /// `args` are passed to the server's log factory with every `new`.
    /// Nothing is connected until [`LogCore::start`] is called.
    pub fn new(
        addr: impl Into<String>,
        path: impl Into<String>,
        args: Vec<String>,
        config: Config,
    ) -> Self {
        Self {
            addr: addr.into(),
            path: path.into(),
            args,
            config,
            shared: Arc::new(Shared {
                link: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                state: RwLock::new(LogState::default()),
                open: AtomicBool::new(false),
                next_cid: AtomicU64::new(1),
                next_link: AtomicU64::new(1),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Path of the log this client is bound to
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether `start` has completed on the current connection
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// Whether a socket to the server exists
    pub fn is_connected(&self) -> bool {
        self.shared.link.lock().is_some()
    }

    /// Number of requests awaiting an ack
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Receive connection state changes
    pub fn subscribe(&self) -> Receiver<ClientEvent> {
        let (tx, rx) = channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Establish the socket if there is none
    ///
    /// The dial happens without holding the link lock, so concurrent
    /// requests fail fast with `NotConnected` meanwhile. If another caller
    /// installs a link first, the extra socket is closed.
    pub fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let stream = self.dial()?;
        stream.set_nodelay(true)?;
        if self.config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(self.config.write_timeout_ms)))?;
        }

        let link = Arc::new(Link {
            id: self.shared.next_link.fetch_add(1, Ordering::Relaxed),
            writer: Mutex::new(BufWriter::new(stream.try_clone()?)),
            stream: stream.try_clone()?,
            closed: AtomicBool::new(false),
        });

        let mut slot = self.shared.link.lock();
        if slot.is_some() {
            drop(slot);
            tracing::debug!("Lost connect race for log {}, closing extra socket", self.path);
            let _ = stream.shutdown(Shutdown::Both);
            return Ok(());
        }

        // The reader cannot tear the link down before it is installed: its
        // disconnect path needs the slot lock held here
        let shared = Arc::clone(&self.shared);
        let link_id = link.id;
        let reader = BufReader::new(stream);
        std::thread::Builder::new()
            .name(format!("seqlog-client-{}", link_id))
            .spawn(move || shared.read_acks(link_id, reader))?;

        tracing::debug!("Connected to {} for log {}", self.addr, self.path);
        *slot = Some(link);
        drop(slot);

        self.shared.emit(ClientEvent::Connected);
        Ok(())
    }

    /// Close the socket, rejecting pending requests
    pub fn close(&self) {
        let link = self.shared.link.lock().clone();
        if let Some(link) = link {
            self.shared.disconnect(link.id);
        }
    }

    /// Send one request and wait for its ack
    ///
    /// - Requests other than `new`/`start`/`del` need a completed `start`
    ///   (`NotOpen`)
    /// - Every request needs a socket (`NotConnected`)
    /// - The ack must arrive within the request timeout (`Timeout`); the
    ///   connection stays up
    pub fn issue(&self, op: Op) -> Result<Ack> {
        let kind = op.command_type();
        if kind == CommandType::Iter {
            return Err(LogError::Unsupported("iter"));
        }

        let needs_open = !matches!(kind, CommandType::New | CommandType::Start | CommandType::Del);
        if needs_open && !self.is_open() {
            return Err(LogError::NotOpen);
        }

        let link = self.shared.link.lock().clone().ok_or(LogError::NotConnected)?;

        let cid = self.shared.next_cid.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::bounded(1);
        {
            let mut pending = self.shared.pending.lock();
            if pending.len() >= self.config.max_pending_requests {
                return Err(LogError::TooManyPending(self.config.max_pending_requests));
            }
            pending.insert(cid, tx);
        }

        // A disconnect that began before the insert has already drained
        // the table, so reject here instead of waiting out the deadline
        if link.closed.load(Ordering::SeqCst) {
            self.shared.pending.lock().remove(&cid);
            return Err(LogError::ConnectionClosed);
        }

        let request = Request::new(cid, self.path.clone(), op);
        if let Err(e) = link.send(&request) {
            self.shared.pending.lock().remove(&cid);
            tracing::debug!("Failed to send {} {}: {}", kind.name(), cid, e);
            return Err(LogError::Connection(e.to_string()));
        }

        let timeout = self.config.request_timeout();
        match rx.recv_timeout(timeout) {
            Ok(result) => result?.into_result(),
            Err(RecvTimeoutError::Timeout) => {
                self.shared.pending.lock().remove(&cid);
                tracing::warn!("{} {} on {} timed out", kind.name(), cid, self.path);
                Err(LogError::Timeout {
                    cid,
                    after_ms: timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(LogError::ConnectionClosed),
        }
    }

    fn register(&self) -> Result<()> {
        self.issue(Op::New {
            args: Some(self.args.clone()),
        })?;
        Ok(())
    }

    fn dial(&self) -> Result<TcpStream> {
        let timeout = self.config.connect_timeout();
        let mut last_error = None;

        for addr in self.addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(LogError::Connection(match last_error {
            Some(e) => format!("connect {}: {}", self.addr, e),
            None => format!("connect {}: no addresses resolved", self.addr),
        }))
    }

    fn set_state(&self, seq: Seq, head: Option<Bytes>) {
        *self.shared.state.write() = LogState { seq, head };
    }
}

impl Drop for LogClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl LogCore for LogClient {
    fn start(&self) -> Result<()> {
        self.connect()?;
        self.register()?;

        let ack = self.issue(Op::Start)?;
        self.set_state(ack.seq.unwrap_or(crate::log::EMPTY_SEQ), ack.head);
        self.shared.open.store(true, Ordering::Release);
        self.shared.emit(ClientEvent::Opened);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.issue(Op::Stop)?;
        self.shared.open.store(false, Ordering::Release);
        Ok(())
    }

    fn append(&self, record: Bytes, expected_seq: Option<Seq>) -> Result<Seq> {
        let ack = self.issue(Op::Append {
            data: record.clone(),
            seq: expected_seq,
        })?;
        let seq = ack
            .seq
            .ok_or_else(|| LogError::Protocol("append ack without seq".to_string()))?;

        self.set_state(seq, Some(record));
        Ok(seq)
    }

    fn append_batch(&self, records: Vec<Bytes>, expected_seq: Option<Seq>) -> Result<Seq> {
        let count = records.len() as Seq;
        let last = records.last().cloned();

        let ack = self.issue(Op::AppendBatch {
            data: records,
            seq: expected_seq,
        })?;
        let first = ack
            .seq
            .ok_or_else(|| LogError::Protocol("appendBatch ack without seq".to_string()))?;

        // The server applies a batch contiguously, so the last record's seq
        // follows from the first one
        if count > 0 {
            self.set_state(first + count - 1, last);
        }
        Ok(first)
    }

    fn truncate(&self, target_seq: Seq) -> Result<()> {
        let ack = self.issue(Op::Truncate { seq: target_seq })?;
        let seq = ack.seq.unwrap_or_else(|| target_seq.min(self.seq()));
        self.set_state(seq, ack.head);
        Ok(())
    }

    fn iterate(&self, _from_seq: Seq, _options: IterOptions) -> Result<RecordIter> {
        Err(LogError::Unsupported("iterate"))
    }

    fn delete(&self) -> Result<()> {
        self.register()?;
        self.issue(Op::Del)?;
        self.shared.open.store(false, Ordering::Release);
        self.set_state(crate::log::EMPTY_SEQ, None);
        Ok(())
    }

    fn seq(&self) -> Seq {
        self.shared.state.read().seq
    }

    fn head(&self) -> Option<Bytes> {
        self.shared.state.read().head.clone()
    }
}

impl Link {
    fn send(&self, request: &Request) -> Result<()> {
        let mut writer = self.writer.lock();
        write_request(&mut *writer, request)
    }
}

impl Shared {
    /// Reader thread: resolve pending requests until the socket closes
    fn read_acks(self: Arc<Self>, link_id: u64, mut reader: BufReader<TcpStream>) {
        loop {
            match read_ack(&mut reader) {
                Ok(ack) => self.resolve(ack),
                Err(e) => {
                    tracing::debug!("Connection {} closed: {}", link_id, e);
                    break;
                }
            }
        }
        self.disconnect(link_id);
    }

    fn resolve(&self, ack: Ack) {
        let reply = self.pending.lock().remove(&ack.cid);
        match reply {
            Some(reply) => {
                let _ = reply.send(Ok(ack));
            }
            None => tracing::debug!("Dropping ack for unknown or expired request {}", ack.cid),
        }
    }

    /// Tear down `link_id` if it is still the current link
    fn disconnect(&self, link_id: u64) {
        let link = {
            let mut slot = self.link.lock();
            match slot.as_ref() {
                Some(link) if link.id == link_id => slot.take(),
                _ => None,
            }
        };
        let Some(link) = link else {
            return;
        };

        link.closed.store(true, Ordering::SeqCst);
        let _ = link.stream.shutdown(Shutdown::Both);
        self.open.store(false, Ordering::Release);

        let rejected: Vec<_> = self.pending.lock().drain().collect();
        if !rejected.is_empty() {
            tracing::warn!(
                "Connection lost with {} requests pending",
                rejected.len()
            );
        }
        for (_, reply) in rejected {
            let _ = reply.send(Err(LogError::ConnectionClosed));
        }

        self.emit(ClientEvent::Disconnected);
    }

    fn emit(&self, event: ClientEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event).is_ok());
    }
}
