//! In-memory log
//!
//! Entries live in one contiguous data buffer; a parallel index of
//! checksummed [`MetaRecord`]s locates each entry. Every read goes through
//! the index, so a damaged index entry surfaces as `CorruptRecord` instead
//! of returning the wrong bytes.

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{LogError, Result};
use crate::meta::{MetaCodec, MetaRecord, RECORD_SIZE};

use super::{IterOptions, LogCore, RecordIter, Seq, EMPTY_SEQ};

/// Volatile [`LogCore`] implementation
pub struct MemoryLog {
    codec: MetaCodec,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    started: bool,
    data: Vec<u8>,
    index: Vec<[u8; RECORD_SIZE]>,
    head: Option<Bytes>,
}

impl MemoryState {
    fn seq(&self) -> Seq {
        self.index.len() as Seq - 1
    }

    fn ensure_started(&self) -> Result<()> {
        if self.started {
            Ok(())
        } else {
            Err(LogError::NotOpen)
        }
    }

    fn check_expected(&self, expected_seq: Option<Seq>) -> Result<()> {
        match expected_seq {
            Some(expected) if expected != self.seq() => Err(LogError::SequenceConflict {
                expected,
                actual: self.seq(),
            }),
            _ => Ok(()),
        }
    }

    fn push(&mut self, codec: &MetaCodec, record: Bytes) -> Seq {
        let seq = self.index.len() as u64;
        let meta = MetaRecord::new(seq, self.data.len() as u64, record.len() as u64);
        self.data.extend_from_slice(&record);
        self.index.push(codec.encode(&meta));
        self.head = Some(record);
        seq as Seq
    }

    fn meta(&self, codec: &MetaCodec, seq: Seq) -> Result<MetaRecord> {
        codec.decode(&self.index[seq as usize])
    }

    fn read(&self, codec: &MetaCodec, seq: Seq) -> Result<Bytes> {
        let meta = self.meta(codec, seq)?;
        let range = data_range(&meta, self.data.len())?;
        Ok(Bytes::copy_from_slice(&self.data[range]))
    }
}

/// Byte range of an entry, checked against a data region of `len` bytes
fn data_range(meta: &MetaRecord, len: usize) -> Result<std::ops::Range<usize>> {
    let malformed = || LogError::MalformedRecord {
        len: usize::try_from(meta.length).unwrap_or(usize::MAX),
    };

    let end = meta.end().ok_or_else(malformed)?;
    if end > len as u64 {
        return Err(malformed());
    }
    Ok(meta.offset as usize..end as usize)
}

impl MemoryLog {
    /// Create an empty, stopped log
    pub fn new() -> Self {
        Self::with_codec(MetaCodec::new())
    }

    /// Create an empty, stopped log indexing with the given codec
    pub fn with_codec(codec: MetaCodec) -> Self {
        Self {
            codec,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Whether the log is started
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Read the record at `seq`
    pub fn get(&self, seq: Seq) -> Result<Option<Bytes>> {
        let state = self.state.lock();
        if seq < 0 || seq > state.seq() {
            return Ok(None);
        }
        state.read(&self.codec, seq).map(Some)
    }

    /// Raw index entry for `seq` (for inspection and tests)
    pub fn index_entry(&self, seq: Seq) -> Option<[u8; RECORD_SIZE]> {
        let i = usize::try_from(seq).ok()?;
        self.state.lock().index.get(i).copied()
    }

    /// Overwrite the raw index entry for `seq`
    ///
    /// Simulates index damage; returns false when `seq` does not exist.
    pub fn overwrite_index_entry(&self, seq: Seq, raw: [u8; RECORD_SIZE]) -> bool {
        let Ok(i) = usize::try_from(seq) else {
            return false;
        };
        let mut state = self.state.lock();
        match state.index.get_mut(i) {
            Some(slot) => {
                *slot = raw;
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LogCore for MemoryLog {
    fn start(&self) -> Result<()> {
        self.state.lock().started = true;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.state.lock().started = false;
        Ok(())
    }

    fn append(&self, record: Bytes, expected_seq: Option<Seq>) -> Result<Seq> {
        let mut state = self.state.lock();
        state.ensure_started()?;
        state.check_expected(expected_seq)?;
        Ok(state.push(&self.codec, record))
    }

    fn append_batch(&self, records: Vec<Bytes>, expected_seq: Option<Seq>) -> Result<Seq> {
        let mut state = self.state.lock();
        state.ensure_started()?;
        state.check_expected(expected_seq)?;

        let first = state.seq() + 1;
        for record in records {
            state.push(&self.codec, record);
        }
        Ok(first)
    }

    fn truncate(&self, target_seq: Seq) -> Result<()> {
        if target_seq < EMPTY_SEQ {
            return Err(LogError::InvalidRequest(format!(
                "truncate target {} is below {}",
                target_seq, EMPTY_SEQ
            )));
        }

        let mut state = self.state.lock();
        state.ensure_started()?;
        if target_seq >= state.seq() {
            return Ok(());
        }

        // The first discarded entry marks where the data region ends
        let cut = state.meta(&self.codec, target_seq + 1)?;
        let head = if target_seq == EMPTY_SEQ {
            None
        } else {
            Some(state.read(&self.codec, target_seq)?)
        };

        state.data.truncate(cut.offset as usize);
        state.index.truncate((target_seq + 1) as usize);
        state.head = head;
        Ok(())
    }

    fn iterate(&self, from_seq: Seq, options: IterOptions) -> Result<RecordIter> {
        let state = self.state.lock();
        state.ensure_started()?;

        let start = from_seq.max(0) as usize;
        let mut index: Vec<[u8; RECORD_SIZE]> = state.index.get(start..).unwrap_or(&[]).to_vec();
        if let Some(limit) = options.limit {
            index.truncate(limit);
        }

        let data = Bytes::copy_from_slice(&state.data);
        let codec = self.codec;
        let iter = index.into_iter().map(move |raw| {
            let meta = codec.decode(&raw)?;
            let range = data_range(&meta, data.len())?;
            Ok((meta.seq as Seq, data.slice(range)))
        });
        Ok(Box::new(iter))
    }

    fn delete(&self) -> Result<()> {
        let mut state = self.state.lock();
        *state = MemoryState::default();
        Ok(())
    }

    fn seq(&self) -> Seq {
        self.state.lock().seq()
    }

    fn head(&self) -> Option<Bytes> {
        self.state.lock().head.clone()
    }
}
