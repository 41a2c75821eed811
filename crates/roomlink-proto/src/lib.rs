//! Protocol types for roomlink.
//!
//! The chat server speaks JSON text frames over a WebSocket bound to a single
//! (identity, room) pair, plus a plain HTTP listing of known rooms. This crate
//! holds the shapes of those frames and the rules for addressing the server;
//! it performs no I/O.
//!
//! # Components
//!
//! - [`InboundMessage`]: a decoded server frame (chat line or notification)
//! - [`ClientFrame`]: frames the client writes to the socket
//! - [`RoomSummary`]: one entry of the room catalog
//! - [`EndpointConfig`]: host/scheme selection and URL derivation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod catalog;
mod endpoint;
pub mod errors;
mod message;

pub use catalog::RoomSummary;
pub use endpoint::{DEFAULT_HOST, EndpointConfig};
pub use errors::{ProtocolError, Result};
pub use message::{ClientFrame, InboundMessage, MessageKind};
