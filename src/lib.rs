//! # SeqLog
//!
//! Network-transparent, append-only, sequence-numbered logs with:
//! - A TCP protocol multiplexing many named logs per server
//! - Request/ack correlation and reference-counted log lifecycle
//! - Decorators for single-writer ordering, restart-on-failure and
//!   append coalescing
//! - Checksummed 32-byte metadata records indexing log entries
//!
//! ## Architecture Overview
//!
//! ```text
//!   caller                                    caller
//!     │                                         │
//! ┌───▼──────────────┐                  ┌───────▼──────────┐
//! │ decorator chain  │                  │ decorator chain  │
//! └───┬──────────────┘                  └───────┬──────────┘
//!     │                                         │
//! ┌───▼──────────────┐    TCP frames    ┌───────▼──────────┐
//! │   LogClient      │◄────────────────►│   TCP Server     │
//! │ (remote LogCore) │  request / ack   │ (session threads)│
//! └──────────────────┘                  └───────┬──────────┘
//!                                               │ path → log
//!                                       ┌───────▼──────────┐
//!                                       │   LogRegistry    │
//!                                       └───────┬──────────┘
//!                                               │
//!                                       ┌───────▼──────────┐
//!                                       │ decorator chain  │
//!                                       └───────┬──────────┘
//!                                               │
//!                                       ┌───────▼──────────┐
//!                                       │ LogCore storage  │
//!                                       │ (MetaRecord idx) │
//!                                       └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod log;
pub mod meta;
pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{BatchConfig, Config};
pub use error::{LogError, Result};
pub use log::{LogCore, LogState, Seq, EMPTY_SEQ};
pub use network::{LogClient, Server};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SeqLog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
