//! Record hash functions

use xxhash_rust::xxh3::{xxh3_128, xxh3_64};

/// Hash function used for the record integrity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashKind {
    /// XXH3, 64-bit digest
    #[default]
    Xxh3_64,

    /// XXH3, 128-bit digest; the high 64 bits are stored
    Xxh3_128,
}

impl HashKind {
    /// Compute the 64 bits of the digest that fit in the record
    pub fn digest(&self, payload: &[u8]) -> u64 {
        match self {
            HashKind::Xxh3_64 => xxh3_64(payload),
            HashKind::Xxh3_128 => {
                let wide = xxh3_128(payload).to_be_bytes();
                let mut head = [0u8; 8];
                head.copy_from_slice(&wide[..8]);
                u64::from_be_bytes(head)
            }
        }
    }
}

