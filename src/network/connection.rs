//! Connection Handler
//!
//! Handles one client session: decodes requests, dispatches them to the
//! registry's logs and writes acks.

use std::collections::HashSet;
use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LogError, Result};
use crate::log::LogCore;
use crate::protocol::{read_request, write_ack, Ack, Op, Request};

use super::registry::{LogRegistry, SessionId};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Logs shared by every session on the server
    registry: Arc<LogRegistry>,

    /// This session's id
    session: SessionId,

    /// Paths this session registered with `new`
    paths: HashSet<String>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O on the stream
    pub fn new(stream: TcpStream, registry: Arc<LogRegistry>, session: SessionId) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            registry,
            session,
            paths: HashSet::new(),
            peer_addr,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends acks. Returns when the client
    /// disconnects, violates the protocol, or an ack cannot be written.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(
            "Session {} established from {}",
            self.session,
            self.peer_addr
        );

        loop {
            // Read next request
            let request = match read_request(&mut self.reader) {
                Ok(request) => request,
                Err(LogError::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(LogError::Io(ref e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection to {} reset", self.peer_addr);
                    return Ok(());
                }
                Err(LogError::Io(ref e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    // Unknown tags and malformed frames end the session
                    tracing::warn!("Closing connection to {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            tracing::trace!("Received request from {}: {:?}", self.peer_addr, request);

            if let Op::Iter { .. } = request.op {
                tracing::warn!(
                    "Client {} sent unsupported iter request, closing connection",
                    self.peer_addr
                );
                return Err(LogError::Protocol("iter is not supported".to_string()));
            }

            let cid = request.cid;
            let ack = match self.execute(request) {
                Ok(ack) => ack,
                Err(e) => {
                    tracing::debug!("Request {} from {} failed: {}", cid, self.peer_addr, e);
                    Ack::error(cid, e.to_string())
                }
            };

            // A session that cannot receive acks is useless
            if let Err(e) = write_ack(&mut self.writer, &ack) {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Execute a request and build its ack
    fn execute(&mut self, request: Request) -> Result<Ack> {
        let Request { cid, path, op } = request;

        if let Op::New { args } = op {
            if path.is_empty() {
                return Err(LogError::InvalidRequest("new: missing path".to_string()));
            }
            let args = args.ok_or_else(|| LogError::InvalidRequest("new: missing args".to_string()))?;

            self.registry.register(&path, &args, self.session)?;
            self.paths.insert(path);
            return Ok(Ack::ok(cid));
        }

        let log = self.log_for(&path)?;
        match op {
            Op::Start => {
                log.start()?;
                Ok(Ack::ok(cid).with_seq(log.seq()).with_head(log.head()))
            }
            Op::Stop => {
                log.stop()?;
                Ok(Ack::ok(cid))
            }
            Op::Append { data, seq } => {
                let seq = log.append(data, seq)?;
                Ok(Ack::ok(cid).with_seq(seq))
            }
            Op::AppendBatch { data, seq } => {
                let first = log.append_batch(data, seq)?;
                Ok(Ack::ok(cid).with_seq(first))
            }
            Op::Truncate { seq } => {
                log.truncate(seq)?;
                Ok(Ack::ok(cid).with_seq(log.seq()).with_head(log.head()))
            }
            Op::Del => {
                self.registry.delete(&path, self.session)?;
                self.paths.remove(&path);
                Ok(Ack::ok(cid))
            }
            Op::New { .. } | Op::Iter { .. } => Err(LogError::Protocol(format!(
                "{} cannot be dispatched to a log",
                op.command_type().name()
            ))),
        }
    }

    /// The log at `path`, if this session registered the resident instance
    fn log_for(&self, path: &str) -> Result<Arc<dyn LogCore>> {
        if !self.paths.contains(path) {
            return Err(LogError::LogUnavailable(path.to_string()));
        }
        self.registry
            .get_for(path, self.session)
            .ok_or_else(|| LogError::LogUnavailable(path.to_string()))
    }

    /// Get the session id
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.registry.release(self.session, &self.paths);
        tracing::debug!("Session {} closed", self.session);
    }
}
