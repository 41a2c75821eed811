//! Chat frames exchanged over the socket.
//!
//! Inbound frames carry a chat line or a membership notification:
//!
//! ```json
//! {"username": "bob", "message": "hi", "timestamp": "2024-05-01T10:00:00",
//!  "message_type": "message", "room_id": "general"}
//! ```
//!
//! Outbound frames are tagged by `type`; the only kind the server accepts from
//! clients is a chat line:
//!
//! ```json
//! {"type": "message", "message": "hi", "room_id": "general"}
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Kind of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Regular chat line from a member.
    Message,
    /// Server-generated announcement.
    System,
    /// A member entered the room.
    UserJoin,
    /// A member left the room.
    UserLeave,
}

impl MessageKind {
    /// Join and leave notifications change room membership.
    pub fn changes_membership(self) -> bool {
        matches!(self, Self::UserJoin | Self::UserLeave)
    }
}

/// A decoded inbound frame.
///
/// Immutable once received. Field names follow the client's vocabulary; the
/// serde attributes map them onto the server's JSON keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Display name of the author.
    #[serde(rename = "username")]
    pub sender: String,

    /// Message text.
    #[serde(rename = "message")]
    pub body: String,

    /// Server timestamp, kept verbatim.
    #[serde(rename = "timestamp")]
    pub sent_at: String,

    /// Frame kind.
    #[serde(rename = "message_type")]
    pub kind: MessageKind,

    /// Room the frame belongs to. Older servers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl InboundMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Room named by the frame, treating an empty id as absent.
    pub fn room(&self) -> Option<&str> {
        self.room_id.as_deref().filter(|room| !room.is_empty())
    }
}

/// Frames written by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Chat line addressed to a room.
    Message {
        /// Message text.
        message: String,
        /// Target room.
        room_id: String,
    },
}

impl ClientFrame {
    /// Chat line for `room_id`.
    pub fn message(body: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self::Message { message: body.into(), room_id: room_id.into() }
    }

    /// Serialize to the JSON text written on the socket.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}
