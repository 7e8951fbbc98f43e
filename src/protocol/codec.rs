//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (1)  │ Len (4)  │      Payload (bincode)      │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Request Payload
//! `(cid: u64, path: String)` followed by the body for the tag:
//! - NEW:          args: Option<Vec<String>>
//! - START/STOP:   empty
//! - APPEND:       (data: bytes, seq: Option<i64>)
//! - APPEND_BATCH: (data: Vec<bytes>, seq: Option<i64>)
//! - TRUNCATE:     seq: i64
//! - DEL:          empty
//! - ITER:         seq: i64
//!
//! ### Ack Payload
//! `Ack { cid, seq, head, err }`

use std::io::{Read, Write};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{LogError, Result};
use crate::log::Seq;

use super::{Ack, Cid, CommandType, Op, Request};

/// Header size: 1 byte tag + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Format: tag (1) + payload_len (4) + payload
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let mut payload = bincode::serialize(&(request.cid, &request.path))?;

    match &request.op {
        Op::New { args } => bincode::serialize_into(&mut payload, args)?,
        Op::Start | Op::Stop | Op::Del => {}
        Op::Append { data, seq } => bincode::serialize_into(&mut payload, &(data, seq))?,
        Op::AppendBatch { data, seq } => bincode::serialize_into(&mut payload, &(data, seq))?,
        Op::Truncate { seq } | Op::Iter { seq } => bincode::serialize_into(&mut payload, seq)?,
    }

    frame(request.command_type() as u8, &payload)
}

/// Decode a request from bytes
///
/// Unknown tags and malformed payloads are protocol errors.
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (tag, payload) = split_frame(bytes)?;

    let command_type = CommandType::from_tag(tag).ok_or_else(|| {
        LogError::Protocol(format!("Unknown command type: 0x{:02x}", tag))
    })?;

    let mut cursor = payload;
    let (cid, path): (Cid, String) = read_field(&mut cursor, command_type)?;

    let op = match command_type {
        CommandType::New => Op::New {
            args: read_field(&mut cursor, command_type)?,
        },
        CommandType::Start => Op::Start,
        CommandType::Stop => Op::Stop,
        CommandType::Append => {
            let (data, seq): (Bytes, Option<Seq>) = read_field(&mut cursor, command_type)?;
            Op::Append { data, seq }
        }
        CommandType::AppendBatch => {
            let (data, seq): (Vec<Bytes>, Option<Seq>) = read_field(&mut cursor, command_type)?;
            Op::AppendBatch { data, seq }
        }
        CommandType::Truncate => Op::Truncate {
            seq: read_field(&mut cursor, command_type)?,
        },
        CommandType::Del => Op::Del,
        CommandType::Iter => Op::Iter {
            seq: read_field(&mut cursor, command_type)?,
        },
        CommandType::Ack => {
            return Err(LogError::Protocol(
                "Ack frame received where a request was expected".to_string(),
            ))
        }
    };

    if !cursor.is_empty() {
        return Err(LogError::Protocol(format!(
            "{} command: {} trailing bytes",
            command_type.name(),
            cursor.len()
        )));
    }

    Ok(Request { cid, path, op })
}

/// Deserialize the next field of a payload
fn read_field<T: DeserializeOwned>(cursor: &mut &[u8], command_type: CommandType) -> Result<T> {
    bincode::deserialize_from(cursor).map_err(|e| {
        LogError::Protocol(format!("{} command: malformed payload: {}", command_type.name(), e))
    })
}

// =============================================================================
// Ack Encoding/Decoding
// =============================================================================

/// Encode an ack to bytes
pub fn encode_ack(ack: &Ack) -> Result<Vec<u8>> {
    let payload = bincode::serialize(ack)?;
    frame(CommandType::Ack as u8, &payload)
}

/// Decode an ack from bytes
pub fn decode_ack(bytes: &[u8]) -> Result<Ack> {
    let (tag, payload) = split_frame(bytes)?;
    if tag != CommandType::Ack as u8 {
        return Err(LogError::Protocol(format!(
            "Expected ack frame, got tag 0x{:02x}",
            tag
        )));
    }

    bincode::deserialize(payload)
        .map_err(|e| LogError::Protocol(format!("ack: malformed payload: {}", e)))
}

// =============================================================================
// Framing
// =============================================================================

/// Prefix `payload` with its header
fn frame(tag: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(LogError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(tag);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    Ok(message)
}

/// Validate a complete frame and split it into tag and payload
fn split_frame(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(LogError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(LogError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() != total_len {
        return Err(LogError::Protocol(format!(
            "Frame length mismatch: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..]))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header + payload) from a stream
///
/// Blocks until a complete frame is received or an error occurs
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(LogError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;
    Ok(message)
}

/// Read a complete request from a stream
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let message = read_frame(reader)?;
    decode_request(&message)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete ack from a stream
pub fn read_ack<R: Read>(reader: &mut R) -> Result<Ack> {
    let message = read_frame(reader)?;
    decode_ack(&message)
}

/// Write an ack to a stream
pub fn write_ack<W: Write>(writer: &mut W, ack: &Ack) -> Result<()> {
    let bytes = encode_ack(ack)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
