//! Input validation bounds.
//!
//! Lengths are counted in characters, not bytes, on the input as typed:
//! surrounding whitespace counts toward the bound but is trimmed from the
//! accepted value.

use crate::ValidationError;

/// Room joined when `login` is given no room.
pub const DEFAULT_ROOM: &str = "general";

/// Validation bounds for user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum identity length.
    pub identity_max: usize,
    /// Maximum message length.
    pub message_max: usize,
    /// Maximum room name length.
    pub room_name_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { identity_max: 20, message_max: 1000, room_name_max: 20 }
    }
}

impl Limits {
    /// Trimmed identity, if acceptable.
    pub fn identity<'a>(&self, identity: &'a str) -> Result<&'a str, ValidationError> {
        let trimmed = identity.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }
        if identity.chars().count() > self.identity_max {
            return Err(ValidationError::IdentityTooLong { max: self.identity_max });
        }
        Ok(trimmed)
    }

    /// Trimmed message body, if acceptable.
    pub fn message<'a>(&self, body: &'a str) -> Result<&'a str, ValidationError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if body.chars().count() > self.message_max {
            return Err(ValidationError::MessageTooLong { max: self.message_max });
        }
        Ok(trimmed)
    }

    /// Trimmed room name, if acceptable.
    pub fn room_name<'a>(&self, name: &'a str) -> Result<&'a str, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyRoomName);
        }
        if name.chars().count() > self.room_name_max {
            return Err(ValidationError::RoomNameTooLong { max: self.room_name_max });
        }
        Ok(trimmed)
    }
}
