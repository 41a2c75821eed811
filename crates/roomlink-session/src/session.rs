//! Session coordinator.
//!
//! [`Session`] owns the [`ConnectionManager`] and translates its actions into
//! room state. User verbs that need a fresh connection (`login`, switching
//! rooms) record a pending operation; the operation settles when the manager
//! reports readiness or failure, and the outcome is returned as
//! [`SessionAction::Settled`].
//!
//! # Responsibilities
//!
//! - Validates input before anything touches the network.
//! - Folds inbound messages into per-room histories and unread counters.
//! - Debounces catalog refreshes triggered by join/leave notifications.
//! - Publishes [`SessionNotice`]s for anything the user should see.

use std::time::Duration;

use roomlink_core::{
    ConnectionAction, ConnectionError, ConnectionManager, ConnectionState, FrameSink,
    HandlerResult, SubscriptionId, Subscribers, Timers, TransportEvent, env::TimePoint,
};
use roomlink_proto::{InboundMessage, RoomSummary};

use crate::{
    DEFAULT_ROOM, Limits, SessionAction, SessionError, SessionNotice, SessionState, ValidationError,
};

/// Delay between a join/leave notification and the catalog refresh it
/// triggers.
pub const DEFAULT_CATALOG_REFRESH_DELAY: Duration = Duration::from_millis(1000);

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Input validation bounds.
    pub limits: Limits,
    /// Debounce delay for membership-triggered catalog refreshes.
    pub catalog_refresh_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { limits: Limits::default(), catalog_refresh_delay: DEFAULT_CATALOG_REFRESH_DELAY }
    }
}

impl SessionConfig {
    /// Set the validation bounds.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the catalog refresh debounce.
    pub fn with_catalog_refresh_delay(mut self, delay: Duration) -> Self {
        self.catalog_refresh_delay = delay;
        self
    }
}

/// Operation waiting for the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingOp {
    Login { identity: String, room: String },
    Switch { room: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTimer {
    CatalogRefresh,
}

/// Session coordinator.
///
/// Pure state machine: no I/O, time is passed in. Generic over the instant
/// type so tests can drive it with hand-advanced time.
#[derive(Debug)]
pub struct Session<I: TimePoint> {
    connection: ConnectionManager<I>,
    config: SessionConfig,
    state: Option<SessionState>,
    pending: Option<PendingOp>,
    timers: Timers<I, SessionTimer>,
    notices: Subscribers<SessionNotice>,
}

impl<I: TimePoint> Session<I> {
    /// Create a logged-out session around `connection`.
    pub fn new(connection: ConnectionManager<I>, config: SessionConfig) -> Self {
        Self {
            connection,
            config,
            state: None,
            pending: None,
            timers: Timers::new(),
            notices: Subscribers::new(),
        }
    }

    /// Session state. `None` while logged out.
    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    /// Whether a login has completed and no logout followed.
    pub fn is_logged_in(&self) -> bool {
        self.state.is_some()
    }

    /// Logged-in identity.
    pub fn identity(&self) -> Option<&str> {
        self.state.as_ref().map(SessionState::identity)
    }

    /// Active room.
    pub fn active_room(&self) -> Option<&str> {
        self.state.as_ref().map(SessionState::active_room)
    }

    /// Whether a login or room switch is waiting for the connection.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Validation bounds.
    pub fn limits(&self) -> &Limits {
        &self.config.limits
    }

    /// Connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Human-readable connection status.
    pub fn status(&self) -> &str {
        self.connection.status()
    }

    /// The connection manager, for reading its state.
    pub fn connection(&self) -> &ConnectionManager<I> {
        &self.connection
    }

    /// The connection manager, for registering message, error and status
    /// subscribers.
    pub fn connection_mut(&mut self) -> &mut ConnectionManager<I> {
        &mut self.connection
    }

    /// Subscribe to user-facing notices.
    pub fn on_notice<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&SessionNotice) -> HandlerResult + Send + 'static,
    {
        self.notices.subscribe(handler)
    }

    /// Remove a notice handler.
    pub fn remove_notice_handler(&mut self, id: SubscriptionId) -> bool {
        self.notices.unsubscribe(id)
    }

    /// Rooms a front-end should list. Empty while logged out.
    pub fn rooms_to_display(&self) -> Vec<RoomSummary> {
        self.state.as_ref().map(SessionState::rooms_to_display).unwrap_or_default()
    }

    /// Unread messages across all rooms.
    pub fn total_unread(&self) -> usize {
        self.state.as_ref().map_or(0, SessionState::total_unread)
    }

    /// Earliest instant at which [`Self::tick`] has work to do.
    pub fn next_deadline(&self) -> Option<I> {
        match (self.connection.next_deadline(), self.timers.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Log in as `identity` and join `room`.
    ///
    /// An empty room falls back to [`DEFAULT_ROOM`]. Settles once the
    /// connection is ready or has failed.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` for a blank or overlong identity
    pub fn login(
        &mut self,
        identity: &str,
        room: &str,
        now: I,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let identity = self.config.limits.identity(identity)?;
        let room = match room.trim() {
            "" => DEFAULT_ROOM,
            room => room,
        };

        tracing::info!(%identity, %room, "logging in");
        let actions = self.connection.connect(identity, room, now)?;
        self.pending =
            Some(PendingOp::Login { identity: identity.to_string(), room: room.to_string() });
        Ok(self.absorb(actions, now))
    }

    /// Disconnect and drop all session state.
    pub fn logout(&mut self) -> Vec<SessionAction> {
        let actions = self.connection.disconnect();
        let out = self.absorb_detached(actions);
        self.pending = None;
        self.timers.cancel_all();

        if let Some(state) = self.state.take() {
            tracing::info!(identity = state.identity(), "logged out");
            self.notices.publish(&SessionNotice::info("Logged out", "See you next time"));
        }
        out
    }

    /// Re-dial the connection for `room` and make it active once ready.
    ///
    /// A switch to the active room, or while logged out, settles immediately.
    /// On failure the active room is left unchanged. Only blank names are
    /// rejected here; the length bound applies to rooms the user creates.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` for a blank room name
    pub fn switch_room(&mut self, room: &str, now: I) -> Result<Vec<SessionAction>, SessionError> {
        let room = room.trim();
        if room.is_empty() {
            return Err(ValidationError::EmptyRoomName.into());
        }
        let Some(state) = &self.state else {
            tracing::debug!(%room, "switch ignored while logged out");
            return Ok(vec![SessionAction::Settled(Ok(()))]);
        };
        if state.active_room() == room {
            return Ok(vec![SessionAction::Settled(Ok(()))]);
        }

        let identity = state.identity().to_string();
        tracing::info!(%room, "switching room");
        let actions = self.connection.connect(&identity, room, now)?;
        self.pending = Some(PendingOp::Switch { room: room.to_string() });
        Ok(self.absorb(actions, now))
    }

    /// Validate `name`, then switch to it.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` for a blank or overlong name
    /// - `SessionError::NotLoggedIn` without a session
    pub fn create_or_join_room(
        &mut self,
        name: &str,
        now: I,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let name = match self.config.limits.room_name(name) {
            Ok(name) => name.to_string(),
            Err(err) => {
                self.notices.publish(&SessionNotice::error("Invalid room name", err.to_string()));
                return Err(err.into());
            },
        };
        if self.state.is_none() {
            self.notices
                .publish(&SessionNotice::error("Not logged in", SessionError::NotLoggedIn.to_string()));
            return Err(SessionError::NotLoggedIn);
        }
        self.switch_room(&name, now)
    }

    /// Send `body` to the active room.
    ///
    /// Returns false for rejected input, while logged out, and when the
    /// connection refuses the write. Every rejection publishes a notice with
    /// its reason.
    pub fn send_message(&mut self, body: &str, sink: &mut impl FrameSink) -> bool {
        let body = match self.config.limits.message(body) {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(%err, "message rejected");
                self.notices.publish(&SessionNotice::error("Message not sent", err.to_string()));
                return false;
            },
        };
        let Some(state) = &self.state else {
            self.notices.publish(&SessionNotice::error(
                "Message not sent",
                SessionError::NotLoggedIn.to_string(),
            ));
            return false;
        };

        let room = state.active_room().to_string();
        if self.connection.send(body, &room, sink) {
            return true;
        }
        self.notices.publish(&SessionNotice::error(
            "Message not sent",
            format!("Could not deliver to {room}, status: {}", self.connection.status()),
        ));
        false
    }

    /// Clear the unread counter of `room`. Returns false if the room has no
    /// history.
    pub fn mark_room_as_read(&mut self, room: &str) -> bool {
        self.state.as_mut().is_some_and(|state| state.mark_read(room))
    }

    /// Replace the room catalog. Ignored while logged out.
    pub fn apply_catalog(&mut self, rooms: Vec<RoomSummary>) {
        match self.state.as_mut() {
            Some(state) => {
                tracing::debug!(rooms = rooms.len(), "catalog updated");
                state.set_catalog(rooms);
            },
            None => tracing::trace!("catalog dropped while logged out"),
        }
    }

    /// Process a transport event.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: I) -> Vec<SessionAction> {
        let actions = self.connection.handle_event(event, now);
        self.absorb(actions, now)
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let actions = self.connection.tick(now);
        let mut out = self.absorb(actions, now);

        for (_, timer) in self.timers.expire(now) {
            match timer {
                SessionTimer::CatalogRefresh if self.state.is_some() => {
                    out.push(SessionAction::RefreshCatalog);
                },
                SessionTimer::CatalogRefresh => {},
            }
        }
        out
    }

    fn absorb(&mut self, actions: Vec<ConnectionAction>, now: I) -> Vec<SessionAction> {
        let mut out = Vec::new();
        for action in actions {
            match action {
                ConnectionAction::Deliver(message) => self.fold(message, now),
                other => out.extend(self.translate(other)),
            }
        }
        out
    }

    /// Absorb actions that cannot carry inbound messages.
    fn absorb_detached(&mut self, actions: Vec<ConnectionAction>) -> Vec<SessionAction> {
        actions.into_iter().flat_map(|action| self.translate(action)).collect()
    }

    fn translate(&mut self, action: ConnectionAction) -> Vec<SessionAction> {
        match action {
            ConnectionAction::Open { transport, url } => {
                vec![SessionAction::Open { transport, url }]
            },
            ConnectionAction::Close { transport, code, reason } => {
                vec![SessionAction::Close { transport, code, reason }]
            },
            ConnectionAction::Ready { .. } => self.on_ready(),
            ConnectionAction::ConnectFailed(err) => self.on_connect_failed(err),
            ConnectionAction::Failed(err) => {
                self.notices.publish(&SessionNotice::error("Connection lost", err.to_string()));
                Vec::new()
            },
            ConnectionAction::Deliver(message) => {
                tracing::trace!(sender = %message.sender, "message outside a session");
                Vec::new()
            },
        }
    }

    fn on_ready(&mut self) -> Vec<SessionAction> {
        match self.pending.take() {
            Some(PendingOp::Login { identity, room }) => {
                let state =
                    self.state.get_or_insert_with(|| SessionState::new(&identity, &room));
                if state.identity() == identity {
                    state.activate(&room);
                } else {
                    *state = SessionState::new(&identity, &room);
                }
                self.notices.publish(&SessionNotice::info(
                    "Welcome",
                    format!("Logged in as {identity} in #{room}"),
                ));
                vec![SessionAction::RefreshCatalog, SessionAction::Settled(Ok(()))]
            },
            Some(PendingOp::Switch { room }) => {
                let Some(state) = self.state.as_mut() else {
                    return vec![SessionAction::Settled(Err(SessionError::NotLoggedIn))];
                };
                state.activate(&room);
                self.notices.publish(&SessionNotice::info("Room joined", format!("Now in #{room}")));
                vec![SessionAction::RefreshCatalog, SessionAction::Settled(Ok(()))]
            },
            None if self.state.is_some() => {
                tracing::info!("connection restored");
                self.notices
                    .publish(&SessionNotice::info("Reconnected", "Connection to the server restored"));
                vec![SessionAction::RefreshCatalog]
            },
            None => Vec::new(),
        }
    }

    fn on_connect_failed(&mut self, err: ConnectionError) -> Vec<SessionAction> {
        match self.pending.take() {
            Some(PendingOp::Login { identity, .. }) => {
                tracing::warn!(%identity, %err, "login failed");
                self.notices.publish(&SessionNotice::error("Login failed", err.to_string()));
                vec![SessionAction::Settled(Err(err.into()))]
            },
            Some(PendingOp::Switch { room }) => {
                tracing::warn!(%room, %err, "room switch failed");
                self.notices.publish(&SessionNotice::error(
                    format!("Failed to switch to room {room}"),
                    err.to_string(),
                ));
                vec![SessionAction::Settled(Err(err.into()))]
            },
            None => {
                tracing::debug!(%err, "connect failure without pending operation");
                Vec::new()
            },
        }
    }

    fn fold(&mut self, message: InboundMessage, now: I) {
        let Some(state) = self.state.as_mut() else {
            tracing::trace!(sender = %message.sender, "message before login settled");
            return;
        };

        let room = message.room().unwrap_or(state.active_room()).to_string();
        let membership = message.kind.changes_membership();
        state.append(&room, message);

        if membership && self.timers.is_empty() {
            let delay = self.config.catalog_refresh_delay;
            self.timers.schedule(now + delay, SessionTimer::CatalogRefresh);
            tracing::debug!(?delay, %room, "catalog refresh scheduled");
        }
    }
}
