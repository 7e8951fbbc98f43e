//! Network Module
//!
//! TCP server and client for remote logs.
//!
//! ## Architecture
//! - Server: single acceptor thread, one session thread per connection
//! - Sessions register logs by path; a log stays resident while any
//!   session references it
//! - Client: one reader thread per connection resolving acks by cid

mod client;
mod connection;
mod registry;
mod server;

pub use client::{ClientEvent, LogClient};
pub use connection::Connection;
pub use registry::{LogRegistry, SessionId};
pub use server::{Server, ServerHandle};
