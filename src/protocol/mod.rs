//! Protocol Module
//!
//! Defines the wire protocol between log clients and the log server.
//!
//! ## Protocol Format (V1 - Tagged Binary Frames)
//!
//! ### Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands (client → server)
//! - 0x01: NEW          - register interest in a log
//! - 0x02: START        - ack: seq, head
//! - 0x03: STOP
//! - 0x04: APPEND       - ack: seq
//! - 0x05: APPEND_BATCH - ack: seq of the first record
//! - 0x06: TRUNCATE     - ack: seq, head
//! - 0x07: DEL
//! - 0x08: ITER         - reserved, closes the connection
//!
//! ### Acks (server → client)
//! - 0x80: ACK - cid + optional seq, head, err
//!
//! Requests and acks are correlated by the client-chosen `cid`; acks may
//! be matched in any order.

mod ack;
mod codec;
mod command;

pub use ack::Ack;
pub use codec::{
    decode_ack, decode_request, encode_ack, encode_request, read_ack, read_request, write_ack,
    write_request, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use command::{Cid, CommandType, Op, Request};
