//! Error types for SeqLog
//!
//! Provides a unified error type for codec, log, and transport operations.

use thiserror::Error;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for SeqLog operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Log unavailable: {0}")]
    LogUnavailable(String),

    #[error("Request {cid} timed out after {after_ms} ms")]
    Timeout { cid: u64, after_ms: u64 },

    #[error("Too many pending requests (limit {0})")]
    TooManyPending(usize),

    #[error("Not connected")]
    NotConnected,

    /// Error string carried back in an ack from the remote server
    #[error("Remote error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    #[error("Not open")]
    NotOpen,

    #[error("Sequence conflict: expected {expected}, log is at {actual}")]
    SequenceConflict { expected: i64, actual: i64 },

    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Log handle closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Metadata Record Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record: stored hash {stored:#018x}, computed {computed:#018x}")]
    CorruptRecord { stored: u64, computed: u64 },

    #[error("Malformed record: expected 32 bytes, got {len}")]
    MalformedRecord { len: usize },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for LogError {
    fn from(err: bincode::Error) -> Self {
        LogError::Serialization(err.to_string())
    }
}

impl LogError {
    /// Produce an equivalent error for fanning one failure out to many callers
    ///
    /// `std::io::Error` is not `Clone`, so I/O errors are rebuilt from their
    /// kind and message.
    pub fn replicate(&self) -> LogError {
        match self {
            LogError::Io(e) => LogError::Io(std::io::Error::new(e.kind(), e.to_string())),
            LogError::Connection(msg) => LogError::Connection(msg.clone()),
            LogError::ConnectionClosed => LogError::ConnectionClosed,
            LogError::Protocol(msg) => LogError::Protocol(msg.clone()),
            LogError::InvalidRequest(msg) => LogError::InvalidRequest(msg.clone()),
            LogError::LogUnavailable(path) => LogError::LogUnavailable(path.clone()),
            LogError::Timeout { cid, after_ms } => LogError::Timeout {
                cid: *cid,
                after_ms: *after_ms,
            },
            LogError::TooManyPending(limit) => LogError::TooManyPending(*limit),
            LogError::NotConnected => LogError::NotConnected,
            LogError::Remote(msg) => LogError::Remote(msg.clone()),
            LogError::NotOpen => LogError::NotOpen,
            LogError::SequenceConflict { expected, actual } => LogError::SequenceConflict {
                expected: *expected,
                actual: *actual,
            },
            LogError::RecoveryFailed(msg) => LogError::RecoveryFailed(msg.clone()),
            LogError::Unsupported(op) => LogError::Unsupported(op),
            LogError::Closed => LogError::Closed,
            LogError::CorruptRecord { stored, computed } => LogError::CorruptRecord {
                stored: *stored,
                computed: *computed,
            },
            LogError::MalformedRecord { len } => LogError::MalformedRecord { len: *len },
            LogError::Serialization(msg) => LogError::Serialization(msg.clone()),
            LogError::Config(msg) => LogError::Config(msg.clone()),
        }
    }
}
