//! Session side-effects.
//!
//! [`SessionAction`]s are produced by [`crate::Session`] for the runtime to
//! execute. Transport actions are passed through from the connection manager
//! untouched.

use roomlink_core::{CloseCode, TransportId};

use crate::SessionError;

/// Actions produced by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a transport.
    Open {
        /// Id to tag the transport's events with.
        transport: TransportId,
        /// Socket URL.
        url: String,
    },

    /// Close a transport.
    Close {
        /// Transport to close.
        transport: TransportId,
        /// Close code to send.
        code: CloseCode,
        /// Close reason to send.
        reason: String,
    },

    /// Fetch the room catalog and hand it to [`crate::Session::apply_catalog`].
    ///
    /// Best-effort: a failed fetch is logged and dropped.
    RefreshCatalog,

    /// The pending `login` or room switch finished.
    Settled(Result<(), SessionError>),
}
