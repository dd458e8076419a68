//! uwsgi wire protocol: frame codec, variable mapping, request synthesis.
//!
//! # Responsibilities
//! - Decode/encode the 4-byte frame header and length-prefixed variable block
//! - Interpret CGI-style variables as HTTP request semantics (and back)
//! - Synthesize a textual HTTP/1.1 request preamble from decoded variables
//!
//! Everything in this module is pure: functions take and return byte buffers
//! and owned values, never touch a socket, and hold no state between calls.

pub mod frame;
pub mod synth;
pub mod vars;

pub use frame::{decode_vars, encode_vars, FrameHeader, HEADER_LEN};
pub use vars::RequestVars;

use thiserror::Error;

/// Wire-level framing failures.
///
/// Any of these closes the connection immediately; no partial request is
/// ever handed to the HTTP parser.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The stream ended before the 4-byte frame header was complete.
    #[error("truncated frame header: stream ended after {0} of 4 bytes")]
    TruncatedHeader(usize),

    /// The header declared more variable bytes than the stream delivered.
    #[error("truncated variable block: header declared {declared} bytes, stream ended after {got}")]
    TruncatedVars { declared: usize, got: usize },

    /// A length prefix inside the variable block points past its end.
    #[error("variable length prefix at offset {offset} overruns block of {size} bytes")]
    LengthOverrun { offset: usize, size: usize },
}

/// The frame decoded cleanly but cannot be interpreted as a request.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A variable the mapping cannot synthesize a request without.
    #[error("missing required variable {0}")]
    MissingVariable(&'static str),

    /// The encoded variable block does not fit the header's 16-bit size field.
    #[error("variable block of {0} bytes exceeds the 16-bit size field")]
    BlockTooLarge(usize),

    /// A single key or value does not fit its 16-bit length prefix.
    #[error("variable {0:?} has a key or value longer than 65535 bytes")]
    OversizedEntry(String),
}

impl From<FramingError> for std::io::Error {
    fn from(err: FramingError) -> Self {
        let kind = match err {
            FramingError::TruncatedHeader(_) | FramingError::TruncatedVars { .. } => {
                std::io::ErrorKind::UnexpectedEof
            }
            FramingError::LengthOverrun { .. } => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}

impl From<ProtocolError> for std::io::Error {
    fn from(err: ProtocolError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
