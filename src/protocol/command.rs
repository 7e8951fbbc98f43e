//! Command definitions
//!
//! Represents requests from clients.

use bytes::Bytes;

use crate::log::Seq;

/// Correlation id: chosen by the client, echoed in the ack
pub type Cid = u64;

/// Frame type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    New = 0x01,
    Start = 0x02,
    Stop = 0x03,
    Append = 0x04,
    AppendBatch = 0x05,
    Truncate = 0x06,
    Del = 0x07,
    /// Reserved; receiving it closes the connection
    Iter = 0x08,
    Ack = 0x80,
}

impl CommandType {
    /// Look up a frame tag, `None` if unknown
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(CommandType::New),
            0x02 => Some(CommandType::Start),
            0x03 => Some(CommandType::Stop),
            0x04 => Some(CommandType::Append),
            0x05 => Some(CommandType::AppendBatch),
            0x06 => Some(CommandType::Truncate),
            0x07 => Some(CommandType::Del),
            0x08 => Some(CommandType::Iter),
            0x80 => Some(CommandType::Ack),
            _ => None,
        }
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            CommandType::New => "new",
            CommandType::Start => "start",
            CommandType::Stop => "stop",
            CommandType::Append => "append",
            CommandType::AppendBatch => "appendBatch",
            CommandType::Truncate => "truncate",
            CommandType::Del => "del",
            CommandType::Iter => "iter",
            CommandType::Ack => "ack",
        }
    }
}

/// A request addressed to one log
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Correlation id
    pub cid: Cid,

    /// Path of the target log
    pub path: String,

    /// What to do
    pub op: Op,
}

/// Type-specific part of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Register interest in a log, creating it from `args` if absent
    New { args: Option<Vec<String>> },

    /// Start the log
    Start,

    /// Stop the log
    Stop,

    /// Append one record, optionally guarded by the expected current seq
    Append { data: Bytes, seq: Option<Seq> },

    /// Append records atomically
    AppendBatch { data: Vec<Bytes>, seq: Option<Seq> },

    /// Discard records after `seq`
    Truncate { seq: Seq },

    /// Delete the log
    Del,

    /// Reserved for iteration; not served
    Iter { seq: Seq },
}

impl Op {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Op::New { .. } => CommandType::New,
            Op::Start => CommandType::Start,
            Op::Stop => CommandType::Stop,
            Op::Append { .. } => CommandType::Append,
            Op::AppendBatch { .. } => CommandType::AppendBatch,
            Op::Truncate { .. } => CommandType::Truncate,
            Op::Del => CommandType::Del,
            Op::Iter { .. } => CommandType::Iter,
        }
    }
}

impl Request {
    pub fn new(cid: Cid, path: impl Into<String>, op: Op) -> Self {
        Self {
            cid,
            path: path.into(),
            op,
        }
    }

    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        self.op.command_type()
    }
}
