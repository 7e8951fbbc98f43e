//! TCP Server
//!
//! Accepts connections and runs one session thread per connection.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{LogError, Result};
use crate::log::LogFactory;

use super::connection::Connection;
use super::registry::{LogRegistry, SessionId};

/// Live sessions, kept so shutdown can close their sockets
type SessionTable = Mutex<HashMap<SessionId, TcpStream>>;

/// TCP server multiplexing named logs over client connections
pub struct Server {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: Arc<LogRegistry>,
    sessions: Arc<SessionTable>,
    next_session: AtomicU64,
    shutdown: AtomicBool,
}

impl Server {
    /// Bind the listen address from `config`
    ///
    /// Logs are created through `factory` when a path is first registered.
    pub fn bind(config: Config, factory: Arc<dyn LogFactory>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            LogError::Connection(format!("bind {}: {}", config.listen_addr, e))
        })?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on {}", local_addr);

        Ok(Self {
            config,
            listener,
            local_addr,
            registry: Arc::new(LogRegistry::new(factory)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_session: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Logs resident on this server
    pub fn registry(&self) -> &Arc<LogRegistry> {
        &self.registry
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Accept connections until [`Server::shutdown`] is called (blocking)
    ///
    /// Accept errors caused by a single peer are skipped. Other errors (such
    /// as running out of file descriptors) back off exponentially; if they
    /// persist the listener is considered broken and the error is returned.
    pub fn run(&self) -> Result<()> {
        let mut backoff = AcceptBackoff::default();

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            match stream {
                Ok(stream) => {
                    backoff.reset();
                    self.accept(stream);
                }
                Err(e) => match backoff.on_error(e.kind()) {
                    Some(delay) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                    }
                    None => {
                        tracing::error!("Listener on {} failed: {}", self.local_addr, e);
                        return Err(LogError::Connection(format!(
                            "accept on {}: {}",
                            self.local_addr, e
                        )));
                    }
                },
            }
        }

        tracing::info!("Listener on {} closed", self.local_addr);
        Ok(())
    }

    /// Stop accepting and close every live session
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        // Wake the blocking accept so `run` observes the flag
        let _ = TcpStream::connect(self.local_addr);

        self.close_sessions();
    }

    /// Close every live session's socket; their logs are released as the
    /// session threads exit
    pub fn close_sessions(&self) {
        for (_, stream) in self.sessions.lock().drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> Result<ServerHandle> {
        let server = Arc::new(self);
        let runner = Arc::clone(&server);
        let thread = std::thread::Builder::new()
            .name("seqlog-accept".to_string())
            .spawn(move || runner.run())?;

        Ok(ServerHandle {
            server,
            thread: Some(thread),
        })
    }

    fn accept(&self, stream: TcpStream) {
        if self.session_count() >= self.config.max_connections {
            tracing::warn!(
                "Rejecting connection: limit of {} reached",
                self.config.max_connections
            );
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let tracked = match stream.try_clone() {
            Ok(tracked) => tracked,
            Err(e) => {
                tracing::warn!("Failed to set up session {}: {}", session, e);
                return;
            }
        };
        self.sessions.lock().insert(session, tracked);

        let registry = Arc::clone(&self.registry);
        let sessions = Arc::clone(&self.sessions);
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let spawned = std::thread::Builder::new()
            .name(format!("seqlog-session-{}", session))
            .spawn(move || {
                match Connection::new(stream, registry, session) {
                    Ok(mut conn) => {
                        let result = conn
                            .set_timeouts(read_ms, write_ms)
                            .and_then(|_| conn.handle());
                        if let Err(e) = result {
                            tracing::debug!("Session {} ended with error: {}", session, e);
                        }
                    }
                    Err(e) => tracing::warn!("Failed to set up session {}: {}", session, e),
                }
                sessions.lock().remove(&session);
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn session thread: {}", e);
            if let Some(stream) = self.sessions.lock().remove(&session) {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }
}

/// Delay policy for failing `accept` calls
#[derive(Debug, Default)]
pub(crate) struct AcceptBackoff {
    failures: u32,
}

impl AcceptBackoff {
    const BASE: Duration = Duration::from_millis(5);
    const MAX: Duration = Duration::from_secs(1);

    /// Consecutive listener failures tolerated before giving up
    const MAX_FAILURES: u32 = 32;

    /// How long to wait before the next accept, `None` to give up
    pub(crate) fn on_error(&mut self, kind: ErrorKind) -> Option<Duration> {
        if matches!(
            kind,
            ErrorKind::ConnectionAborted
                | ErrorKind::ConnectionReset
                | ErrorKind::Interrupted
                | ErrorKind::WouldBlock
        ) {
            return Some(Duration::ZERO);
        }

        self.failures += 1;
        if self.failures > Self::MAX_FAILURES {
            return None;
        }
        let factor = 1u32 << (self.failures - 1).min(16);
        Some((Self::BASE * factor).min(Self::MAX))
    }

    pub(crate) fn reset(&mut self) {
        self.failures = 0;
    }
}

/// A server running on a background thread
///
/// Dropping the handle shuts the server down.
pub struct ServerHandle {
    server: Arc<Server>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl ServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// The running server
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Whether a log is currently resident
    pub fn is_resident(&self, path: &str) -> bool {
        self.server.registry().contains(path)
    }

    /// Number of resident logs
    pub fn log_count(&self) -> usize {
        self.server.registry().len()
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.server.session_count()
    }

    /// Stop the server and wait for the accept loop to exit
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.server.shutdown();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| LogError::Connection("accept thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Server shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_errors_retry_immediately() {
        let mut backoff = AcceptBackoff::default();
        for _ in 0..100 {
            assert_eq!(
                backoff.on_error(ErrorKind::ConnectionAborted),
                Some(Duration::ZERO)
            );
        }
    }

    #[test]
    fn test_listener_errors_back_off_then_give_up() {
        let mut backoff = AcceptBackoff::default();

        assert_eq!(backoff.on_error(ErrorKind::Other), Some(Duration::from_millis(5)));
        assert_eq!(backoff.on_error(ErrorKind::Other), Some(Duration::from_millis(10)));
        assert_eq!(backoff.on_error(ErrorKind::Other), Some(Duration::from_millis(20)));

        for _ in 3..AcceptBackoff::MAX_FAILURES {
            let delay = backoff.on_error(ErrorKind::Other).unwrap();
            assert!(delay <= AcceptBackoff::MAX);
        }
        assert_eq!(backoff.on_error(ErrorKind::Other), None);
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = AcceptBackoff::default();
        for _ in 0..5 {
            backoff.on_error(ErrorKind::Other);
        }

        backoff.reset();
        assert_eq!(backoff.on_error(ErrorKind::Other), Some(Duration::from_millis(5)));
    }
}
