//! Connection core for roomlink.
//!
//! Sans-IO building blocks for a client that keeps one chat socket alive and
//! re-dials it when it drops. Nothing here touches the network or a clock:
//! callers pass in the current time and transport events, and execute the
//! [`ConnectionAction`]s that come back.
//!
//! # Components
//!
//! - [`ConnectionManager`]: owns the single transport, runs the bounded retry
//!   loop and decodes inbound frames
//! - [`Timers`]: cancellable scheduled tasks keyed by [`TimerId`]
//! - [`Subscribers`]: ordered handler lists with per-handler failure isolation
//! - [`env::Environment`]: time source abstraction for drivers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod subscribers;
pub mod timer;

pub use connection::{
    CloseCode, ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, FrameSink,
    TransportEvent, TransportId,
};
pub use error::ConnectionError;
pub use subscribers::{HandlerError, HandlerResult, Subscribers, SubscriptionId};
pub use timer::{TimerId, Timers};
