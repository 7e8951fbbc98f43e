//! Metadata record encoding/decoding

use crate::error::{LogError, Result};

use super::{HashKind, HASHED_RANGE, RECORD_SIZE};

/// Decoded metadata for one log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaRecord {
    /// Sequence number of the entry
    pub seq: u64,

    /// Byte offset of the entry in its data region
    pub offset: u64,

    /// Length of the entry in bytes
    pub length: u64,
}

impl MetaRecord {
    pub fn new(seq: u64, offset: u64, length: u64) -> Self {
        Self { seq, offset, length }
    }

    /// Offset one past the last byte of the entry, `None` on overflow
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }
}

/// Encoder/decoder for 32-byte metadata records
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaCodec {
    hash: HashKind,
}

impl MetaCodec {
    /// Codec using the default 64-bit hash
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec using the given hash function
    pub fn with_hash(hash: HashKind) -> Self {
        Self { hash }
    }

    pub fn hash_kind(&self) -> HashKind {
        self.hash
    }

    /// Encode a record
    ///
    /// Format: hash (8) + seq (8) + offset (8) + length (8), big-endian
    pub fn encode(&self, record: &MetaRecord) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[8..16].copy_from_slice(&record.seq.to_be_bytes());
        out[16..24].copy_from_slice(&record.offset.to_be_bytes());
        out[24..32].copy_from_slice(&record.length.to_be_bytes());

        let hash = self.hash.digest(&out[HASHED_RANGE]);
        out[0..8].copy_from_slice(&hash.to_be_bytes());
        out
    }

    /// Decode and verify a record
    ///
    /// Fails with `MalformedRecord` unless `bytes` is exactly 32 bytes, and
    /// with `CorruptRecord` if the stored hash does not match the payload.
    pub fn decode(&self, bytes: &[u8]) -> Result<MetaRecord> {
        if bytes.len() != RECORD_SIZE {
            return Err(LogError::MalformedRecord { len: bytes.len() });
        }

        let stored = read_u64(bytes, 0);
        let computed = self.hash.digest(&bytes[HASHED_RANGE]);
        if stored != computed {
            return Err(LogError::CorruptRecord { stored, computed });
        }

        Ok(MetaRecord {
            seq: read_u64(bytes, 8),
            offset: read_u64(bytes, 16),
            length: read_u64(bytes, 24),
        })
    }
}

/// Encode with the default codec
pub fn encode(seq: u64, offset: u64, length: u64) -> [u8; RECORD_SIZE] {
    MetaCodec::new().encode(&MetaRecord::new(seq, offset, length))
}

/// Decode with the default codec
pub fn decode(bytes: &[u8]) -> Result<MetaRecord> {
    MetaCodec::new().decode(bytes)
}

/// Read a big-endian u64 at `at` (caller guarantees bounds)
fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_be_bytes(buf)
}
