//! Async runtime.
//!
//! Executes [`SessionAction`]s against a [`Transport`] and a
//! [`CatalogSource`], and feeds transport events and timer deadlines back into
//! the session. Operations that settle later (`login`, room switches) are
//! awaited here by pumping events until the session reports the outcome.
//!
//! Waiting ([`Runtime::wait`]) and processing ([`Runtime::dispatch`]) are
//! separate so a front-end can `select!` on [`Runtime::wait`] alongside its
//! own input without holding the runtime across the handler.

use std::time::Duration;

use roomlink_core::{TransportEvent, env::Environment};
use roomlink_session::{Session, SessionAction, SessionError};
use thiserror::Error;

use crate::{CatalogSource, ClientConfig, Transport};

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The transport stopped producing events.
    #[error("transport event stream ended")]
    TransportClosed,

    /// I/O error from the front-end.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What woke the runtime up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// A transport event, or `None` if the event stream ended.
    Event(Option<TransportEvent>),
    /// A session or connection deadline passed.
    Deadline,
}

/// Drives a [`Session`] with real I/O.
pub struct Runtime<T, C, E: Environment> {
    session: Session<E::Instant>,
    transport: T,
    catalog: C,
    catalog_timeout: Duration,
    env: E,
}

impl<T, C, E> Runtime<T, C, E>
where
    T: Transport,
    C: CatalogSource,
    E: Environment,
{
    /// Create a logged-out runtime.
    pub fn new(config: &ClientConfig, transport: T, catalog: C, env: E) -> Self {
        Self {
            session: config.build_session(),
            transport,
            catalog,
            catalog_timeout: config.catalog_timeout,
            env,
        }
    }

    /// The session being driven.
    pub fn session(&self) -> &Session<E::Instant> {
        &self.session
    }

    /// The session, for registering subscribers.
    pub fn session_mut(&mut self) -> &mut Session<E::Instant> {
        &mut self.session
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Log in and wait until the connection is ready or has failed.
    pub async fn login(&mut self, identity: &str, room: &str) -> Result<(), RuntimeError> {
        let now = self.env.now();
        let actions = self.session.login(identity, room, now)?;
        self.settle(actions).await
    }

    /// Log out. Never fails.
    pub async fn logout(&mut self) {
        let actions = self.session.logout();
        self.execute(actions).await;
    }

    /// Switch rooms and wait for the new connection.
    pub async fn switch_room(&mut self, room: &str) -> Result<(), RuntimeError> {
        let now = self.env.now();
        let actions = self.session.switch_room(room, now)?;
        self.settle(actions).await
    }

    /// Validate `name`, then switch to it.
    pub async fn create_or_join_room(&mut self, name: &str) -> Result<(), RuntimeError> {
        let now = self.env.now();
        let actions = self.session.create_or_join_room(name, now)?;
        self.settle(actions).await
    }

    /// Send `body` to the active room.
    pub fn send_message(&mut self, body: &str) -> bool {
        self.session.send_message(body, &mut self.transport)
    }

    /// Clear a room's unread counter.
    pub fn mark_room_as_read(&mut self, room: &str) -> bool {
        self.session.mark_room_as_read(room)
    }

    /// Fetch the room catalog. Failures and fetches outliving the catalog
    /// timeout are logged and dropped.
    pub async fn refresh_catalog(&mut self) {
        let fetched = tokio::select! {
            result = self.catalog.fetch_rooms() => Some(result),
            () = self.env.sleep(self.catalog_timeout) => None,
        };
        match fetched {
            Some(Ok(rooms)) => self.session.apply_catalog(rooms),
            Some(Err(e)) => tracing::warn!(error = %e, "catalog refresh failed"),
            None => tracing::warn!(timeout = ?self.catalog_timeout, "catalog refresh timed out"),
        }
    }

    /// Wait for the next transport event or deadline.
    ///
    /// Cancel safe: dropping the future loses nothing.
    pub async fn wait(&mut self) -> Wake {
        let timeout = self.session.next_deadline().map(|deadline| self.env.until(deadline));
        let env = &self.env;
        let transport = &mut self.transport;

        tokio::select! {
            event = transport.next_event() => Wake::Event(event),
            () = async move {
                match timeout {
                    Some(timeout) => env.sleep(timeout).await,
                    None => std::future::pending::<()>().await,
                }
            } => Wake::Deadline,
        }
    }

    /// Process what [`Self::wait`] returned.
    ///
    /// Returns the outcome of a pending operation if this settled one.
    pub async fn dispatch(
        &mut self,
        wake: Wake,
    ) -> Result<Option<Result<(), SessionError>>, RuntimeError> {
        let now = self.env.now();
        let actions = match wake {
            Wake::Event(Some(event)) => self.session.handle_transport_event(event, now),
            Wake::Event(None) => return Err(RuntimeError::TransportClosed),
            Wake::Deadline => self.session.tick(now),
        };
        Ok(self.execute(actions).await)
    }

    /// Wait for and process one wake-up.
    pub async fn pump(&mut self) -> Result<(), RuntimeError> {
        let wake = self.wait().await;
        self.dispatch(wake).await.map(|_| ())
    }

    async fn settle(&mut self, actions: Vec<SessionAction>) -> Result<(), RuntimeError> {
        let mut outcome = self.execute(actions).await;
        while outcome.is_none() {
            let wake = self.wait().await;
            outcome = self.dispatch(wake).await?;
        }
        match outcome {
            Some(Err(e)) => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) -> Option<Result<(), SessionError>> {
        let mut settled = None;
        for action in actions {
            match action {
                SessionAction::Open { transport, url } => self.transport.open(transport, url),
                SessionAction::Close { transport, code, reason } => {
                    self.transport.close(transport, code, reason);
                },
                SessionAction::RefreshCatalog => self.refresh_catalog().await,
                SessionAction::Settled(outcome) => settled = Some(outcome),
            }
        }
        settled
    }
}
