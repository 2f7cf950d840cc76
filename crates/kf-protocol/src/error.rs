//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or encoding protocol data
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A length-prefixed field is larger than the reader allows
    #[error("Field too long: {len} bytes exceeds maximum of {max} bytes")]
    FieldTooLong { len: usize, max: usize },

    /// Input ended in the middle of a record
    #[error("Truncated record: input ended inside a record")]
    Truncated,

    /// Payload could not be decoded
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// The peer understood the request but refused it
    #[error("Request refused by peer: {0}")]
    RequestRefused(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
