//! Ack definitions
//!
//! Represents responses to clients.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};
use crate::log::Seq;

use super::Cid;

/// Response to a request, matched to it by `cid`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    /// Correlation id of the request being answered
    pub cid: Cid,

    /// Seq after the operation (start, append, appendBatch, truncate)
    pub seq: Option<Seq>,

    /// Last record after the operation (start, truncate)
    pub head: Option<Bytes>,

    /// Error message if the operation failed
    pub err: Option<String>,
}

impl Ack {
    /// Create a bare success ack
    pub fn ok(cid: Cid) -> Self {
        Self {
            cid,
            seq: None,
            head: None,
            err: None,
        }
    }

    /// Create an error ack
    pub fn error(cid: Cid, message: impl Into<String>) -> Self {
        Self {
            err: Some(message.into()),
            ..Self::ok(cid)
        }
    }

    pub fn with_seq(mut self, seq: Seq) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn with_head(mut self, head: Option<Bytes>) -> Self {
        self.head = head;
        self
    }

    pub fn is_error(&self) -> bool {
        self.err.is_some()
    }

    /// Turn an error ack into `LogError::Remote`
    pub fn into_result(self) -> Result<Ack> {
        match self.err {
            Some(message) => Err(LogError::Remote(message)),
            None => Ok(self),
        }
    }
}
