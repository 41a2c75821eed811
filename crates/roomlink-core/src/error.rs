//! Error types for the connection core.
//!
//! One enum covers the whole connection lifecycle: failures a `connect` caller
//! sees directly, closures that feed the retry loop, the terminal exhaustion
//! error, and send failures.

use std::{io, time::Duration};

use thiserror::Error;

/// Errors raised by [`crate::ConnectionManager`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// `connect` called without an identity.
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// Transport did not become ready in time.
    #[error("connection timeout after {elapsed:?}")]
    ConnectTimeout {
        /// How long we waited.
        elapsed: Duration,
    },

    /// Transport failed before becoming ready.
    #[error("connection failed: {0}")]
    ConnectFailure(String),

    /// Attempt abandoned by `disconnect` or a newer `connect`.
    #[error("connection attempt cancelled")]
    Cancelled,

    /// An open connection closed with a non-normal code.
    #[error("connection closed abnormally (code {code})")]
    AbnormalClosure {
        /// Close code reported by the transport.
        code: u16,
    },

    /// The retry loop gave up.
    #[error("could not reconnect to the server after {attempts} attempts, please restart the session")]
    RetryExhausted {
        /// Retries made before giving up.
        attempts: u32,
    },

    /// `send` called while no transport is open.
    #[error("not connected to the chat server")]
    NotConnected,

    /// Frame could not be serialized or written.
    #[error("failed to send message: {0}")]
    SendFailure(String),

    /// Underlying transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<roomlink_proto::ProtocolError> for ConnectionError {
    fn from(err: roomlink_proto::ProtocolError) -> Self {
        Self::SendFailure(err.to_string())
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
