//! Configuration for SeqLog
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{LogError, Result};

/// Minimum number of peers the consensus layer needs to form a quorum
pub const MIN_PEERS: usize = 3;

/// Main configuration for a SeqLog server or client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address (server) or default remote address (CLI)
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    ///
    /// Clients hold connections open between requests, so the default is
    /// no timeout.
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Deadline for a single request/ack exchange (milliseconds)
    pub request_timeout_ms: u64,

    /// Upper bound on requests awaiting an ack per client connection
    pub max_pending_requests: usize,

    // -------------------------------------------------------------------------
    // Log Chain Configuration
    // -------------------------------------------------------------------------
    /// Append coalescing for server-side logs
    pub batch: BatchConfig,

    // -------------------------------------------------------------------------
    // Cluster Configuration
    // -------------------------------------------------------------------------
    /// Peer addresses handed to the consensus layer
    pub peers: Vec<String>,
}

/// Append coalescing configuration
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Whether appends are coalesced at all
    pub enabled: bool,

    /// How long the first buffered append waits for company (milliseconds)
    pub interval_ms: u64,

    /// Flush as soon as this many appends are buffered
    pub max_records: usize,
}

impl BatchConfig {
    /// Batching enabled with the given interval and size trigger
    pub fn enabled(interval_ms: u64, max_records: usize) -> Self {
        Self {
            enabled: true,
            interval_ms,
            max_records: max_records.max(1),
        }
    }

    /// Batching disabled (appends pass straight through)
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 2,
            max_records: 64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7070".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            connect_timeout_ms: 3000,
            request_timeout_ms: 10_000,
            max_pending_requests: 1024,
            batch: BatchConfig::default(),
            peers: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Parse a comma-separated peer list
///
/// Blank entries are ignored. Fewer than [`MIN_PEERS`] peers is an error:
/// the consensus layer cannot form a quorum with them.
pub fn parse_peers(raw: &str) -> Result<Vec<String>> {
    let peers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if peers.len() < MIN_PEERS {
        return Err(LogError::Config(format!(
            "at least {} peers required, got {}",
            MIN_PEERS,
            peers.len()
        )));
    }

    Ok(peers)
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the per-request deadline (in milliseconds)
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Set the pending request limit per client connection
    pub fn max_pending_requests(mut self, count: usize) -> Self {
        self.config.max_pending_requests = count;
        self
    }

    /// Set the append coalescing configuration
    pub fn batch(mut self, batch: BatchConfig) -> Self {
        self.config.batch = batch;
        self
    }

    /// Set the peer list
    pub fn peers(mut self, peers: Vec<String>) -> Self {
        self.config.peers = peers;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
