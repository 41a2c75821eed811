//! Networked client for roomlink.
//!
//! Drives the sans-IO [`roomlink_session::Session`] with real I/O: a
//! WebSocket transport for the chat socket, an HTTP source for the room
//! catalog and tokio's clock for timers.
//!
//! # Components
//!
//! - [`Runtime`]: executes session actions and waits for events or deadlines
//! - [`transport::WsTransport`]: one tokio task per socket
//! - [`catalog::HttpCatalog`]: fetches the room list
//! - [`Command`]: line commands understood by the `roomlink` binary

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod catalog;
mod command;
mod config;
mod runtime;
mod system_env;
pub mod transport;

pub use catalog::{CatalogError, CatalogSource, HttpCatalog};
pub use command::Command;
pub use config::{ClientConfig, DEFAULT_CATALOG_TIMEOUT};
pub use runtime::{Runtime, RuntimeError, Wake};
pub use system_env::SystemEnv;
pub use transport::{Transport, WsTransport};
