//! Metadata Record Module
//!
//! Fixed-size, checksummed records that index log entries.
//!
//! ## Responsibilities
//! - Encode (seq, offset, length) into a 32-byte record
//! - Detect corruption on decode by recomputing the hash
//! - Reject records that are not exactly 32 bytes
//!
//! ## Record Format
//! ```text
//! ┌──────────┬──────────┬────────────┬────────────┐
//! │ Hash (8) │ Seq (8)  │ Offset (8) │ Length (8) │
//! └──────────┴──────────┴────────────┴────────────┘
//!   0          8          16           24        32
//! ```
//!
//! All integers are big-endian. The hash covers bytes 8..32.
//!
//! ## Hash Width
//! The hash function is pluggable ([`HashKind`]); wider variants such as
//! XXH3-128 are accepted, but the layout only has room for 8 bytes, so only
//! the leading 64 bits of any digest are stored and compared. This is a
//! property of the format: widening it means a new record size.

mod hash;
mod record;

pub use hash::HashKind;
pub use record::{decode, encode, MetaCodec, MetaRecord};

/// Size of an encoded metadata record
pub const RECORD_SIZE: usize = 32;

/// Bytes covered by the hash (everything after the hash itself)
pub const HASHED_RANGE: std::ops::Range<usize> = 8..RECORD_SIZE;
