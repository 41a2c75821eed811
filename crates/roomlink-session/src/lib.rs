//! Session layer for roomlink.
//!
//! Pure state machine that turns connection events into per-room histories
//! with unread counters, and exposes the user-facing verbs (login, switch
//! room, send). Like the connection core it performs no I/O: callers feed it
//! time and transport events and execute the [`SessionAction`]s it returns.
//!
//! # Components
//!
//! - [`Session`]: the coordinator, owning the [`roomlink_core::ConnectionManager`]
//! - [`SessionState`]: identity, active room, histories and room catalog
//! - [`Limits`]: input validation bounds
//! - [`SessionNotice`]: user-facing notices published to subscribers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod error;
mod limits;
mod notice;
mod session;
mod state;

pub use action::SessionAction;
pub use error::{SessionError, ValidationError};
pub use limits::{DEFAULT_ROOM, Limits};
pub use notice::{NoticeLevel, SessionNotice};
pub use session::{DEFAULT_CATALOG_REFRESH_DELAY, Session, SessionConfig};
pub use state::{RoomHistory, SessionState};
