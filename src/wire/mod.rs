//! Text wire format shared with the ping server.
//!
//! Every message is a UTF-8 text frame whose first character is a
//! single-character opcode; the remainder is the opcode-specific body.
//! For ping messages and their acknowledgments the body is the decimal
//! sequence tag.

use crate::error::WireError;

/// Protocol revision. Not yet carried on the wire.
pub const PROTOCOL_VERSION: &str = "0";

/// Opcode for a ping message and its acknowledgment.
pub const PING_OPCODE: char = '0';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Ping or its acknowledgment; the body carries the correlating tag.
    Ping { body: String },
}

impl Frame {
    pub fn ping(body: impl Into<String>) -> Self {
        Frame::Ping { body: body.into() }
    }

    /// Parses a raw inbound frame. An opcode with no body is invalid.
    pub fn parse(raw: &str) -> Result<Self, WireError> {
        let mut chars = raw.chars();
        let opcode = match chars.next() {
            Some(c) => c,
            None => return Err(WireError::TooShort(raw.to_string())),
        };
        let body: String = chars.collect();
        if body.is_empty() {
            return Err(WireError::TooShort(raw.to_string()));
        }

        match opcode {
            PING_OPCODE => Ok(Frame::Ping { body }),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Frame::Ping { body } => format!("{}{}", PING_OPCODE, body),
        }
    }

    /// Interprets the frame body as the decimal sequence tag.
    pub fn tag(&self) -> Result<u64, WireError> {
        match self {
            Frame::Ping { body } => body
                .parse()
                .map_err(|_| WireError::InvalidTag(body.clone())),
        }
    }
}
