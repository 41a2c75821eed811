//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Inbound text was not a valid frame.
    #[error("frame decode failed: {0}")]
    Decode(String),

    /// Outbound frame could not be serialized.
    #[error("frame encode failed: {0}")]
    Encode(String),
}
