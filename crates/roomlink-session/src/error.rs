//! Session errors.

use roomlink_core::ConnectionError;
use thiserror::Error;

/// Bad user input, rejected before any network action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identity blank after trimming.
    #[error("Username is required")]
    EmptyIdentity,

    /// Identity longer than the limit.
    #[error("Username must be {max} characters or less")]
    IdentityTooLong {
        /// Maximum length in characters.
        max: usize,
    },

    /// Message blank after trimming.
    #[error("Message cannot be empty")]
    EmptyMessage,

    /// Message longer than the limit.
    #[error("Message must be {max} characters or less")]
    MessageTooLong {
        /// Maximum length in characters.
        max: usize,
    },

    /// Room name blank after trimming.
    #[error("Room name is required")]
    EmptyRoomName,

    /// Room name longer than the limit.
    #[error("Room name must be {max} characters or less")]
    RoomNameTooLong {
        /// Maximum length in characters.
        max: usize,
    },
}

/// Errors returned by [`crate::Session`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Input rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Connection failed or was cancelled.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Operation needs a logged-in session.
    #[error("Please log in first")]
    NotLoggedIn,
}
