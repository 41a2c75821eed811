//! Connection manager state machine.
//!
//! Owns the single chat transport, decodes inbound frames and runs the bounded
//! reconnection loop. Uses the action pattern: methods take time and transport
//! events as input and return actions for the driver to execute. The manager
//! never performs I/O itself.
//!
//! # State Machine
//!
//! ```text
//!            connect           Opened
//! ┌──────┐ ──────────> ┌────────────┐ ─────────> ┌──────┐
//! │ Idle │             │ Connecting │            │ Open │
//! └──────┘ <────────── └────────────┘            └──────┘
//!    ^     timeout/error     ^                     │  │
//!    │     (caller attempt)  │ retry timer         │  │ Error
//!    │                       │                     │  v
//!    │   exhausted     ┌──────────────┐  abnormal  │ ┌─────────┐
//!    └──────────────── │ Reconnecting │ <──────────┴─│ Closing │
//!                      └──────────────┘    close     └─────────┘
//! ```
//!
//! A normal closure (code 1000) of an open connection returns to `Idle`
//! without retrying. Every other closure is retry eligible until the retry
//! budget is spent. `disconnect` forces `Idle` from any state.

use std::{fmt, io, time::Duration};

use roomlink_proto::{ClientFrame, EndpointConfig, InboundMessage};

use crate::{
    env::TimePoint,
    error::ConnectionError,
    subscribers::{HandlerResult, Subscribers, SubscriptionId},
    timer::Timers,
};

/// Reconnect attempts made after an abnormal closure before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Delay between an abnormal closure and the next reconnect attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// Time allowed for a transport to become ready.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// WebSocket close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Intentional shutdown. Never retried.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint is going away after an error.
    pub const GOING_AWAY: Self = Self(1001);
    /// Connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);

    /// Whether this code marks an intentional disconnect.
    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one physical transport opened by the manager.
///
/// Every attempt gets a fresh id so late events from a torn-down socket can
/// be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportId(u64);

impl TransportId {
    /// Wrap a raw id. The manager allocates ids itself; drivers only need
    /// this to fabricate events in tests.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport-{}", self.0)
    }
}

/// Events reported by the driver about a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake finished, transport is ready.
    Opened {
        /// Transport that opened.
        transport: TransportId,
    },
    /// A text frame arrived.
    Frame {
        /// Transport that received the frame.
        transport: TransportId,
        /// Raw frame contents.
        text: String,
    },
    /// The transport reported an error. A `Closed` event follows.
    Error {
        /// Transport that failed.
        transport: TransportId,
        /// Human-readable cause.
        reason: String,
    },
    /// The transport closed.
    Closed {
        /// Transport that closed.
        transport: TransportId,
        /// Close code from the peer, or [`CloseCode::ABNORMAL`] if none.
        code: CloseCode,
    },
}

impl TransportEvent {
    /// Transport this event belongs to.
    pub fn transport(&self) -> TransportId {
        match self {
            Self::Opened { transport }
            | Self::Frame { transport, .. }
            | Self::Error { transport, .. }
            | Self::Closed { transport, .. } => *transport,
        }
    }
}

/// Synchronous write half of the transport.
pub trait FrameSink {
    /// Queue `text` on `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is gone or refuses the write.
    fn send_text(&mut self, transport: TransportId, text: String) -> io::Result<()>;
}

/// Actions returned by the connection manager.
///
/// The driver executes `Open` and `Close`. The remaining variants report
/// outcomes to the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a transport to `url` and report its events under `transport`.
    Open {
        /// Id to tag events with.
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
    /// A transport became ready. Emitted for caller and retry attempts alike.
    Ready {
        /// The ready transport.
        transport: TransportId,
    },
    /// A `connect` call failed. Never emitted for retry attempts.
    ConnectFailed(ConnectionError),
    /// A decoded inbound message, already published to subscribers.
    Deliver(InboundMessage),
    /// The retry loop gave up. Already published to error subscribers.
    Failed(ConnectionError),
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no pending retry.
    Idle,
    /// Transport opening, waiting for readiness.
    Connecting,
    /// Transport ready.
    Open,
    /// Transport failed, waiting for its close.
    Closing,
    /// Waiting for the retry timer.
    Reconnecting,
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Reconnect attempts after an abnormal closure.
    pub max_retries: u32,
    /// Delay before each reconnect attempt.
    pub retry_delay: Duration,
    /// Time allowed for a transport to become ready.
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retries.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the readiness timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Who started the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Caller,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionTimer {
    ConnectTimeout,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    identity: String,
    room: String,
}

const STATUS_CONNECTING: &str = "Connecting";
const STATUS_CONNECTED: &str = "Connected";
const STATUS_DISCONNECTED: &str = "Disconnected";

/// Connection manager.
///
/// Holds at most one live transport. Generic over the instant type so tests
/// can drive it with hand-advanced time.
#[derive(Debug)]
pub struct ConnectionManager<I: TimePoint> {
    config: ConnectionConfig,
    endpoint: EndpointConfig,
    state: ConnectionState,
    target: Option<Target>,
    transport: Option<TransportId>,
    origin: Origin,
    /// Caller attempt already reported as failed, waiting for its close.
    attempt_failed: bool,
    retry_count: u32,
    next_transport: u64,
    timers: Timers<I, ConnectionTimer>,
    status: String,
    messages: Subscribers<InboundMessage>,
    errors: Subscribers<ConnectionError>,
    statuses: Subscribers<str>,
}

impl<I: TimePoint> ConnectionManager<I> {
    /// Create an idle manager.
    pub fn new(config: ConnectionConfig, endpoint: EndpointConfig) -> Self {
        Self {
            config,
            endpoint,
            state: ConnectionState::Idle,
            target: None,
            transport: None,
            origin: Origin::Caller,
            attempt_failed: false,
            retry_count: 0,
            next_transport: 0,
            timers: Timers::new(),
            status: STATUS_DISCONNECTED.to_string(),
            messages: Subscribers::new(),
            errors: Subscribers::new(),
            statuses: Subscribers::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Latest human-readable status.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Reconnect attempts made since the last successful open.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether a transport is ready for `send`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Current transport, if one is opening or open.
    pub fn transport(&self) -> Option<TransportId> {
        self.transport
    }

    /// Identity of the current or last requested connection.
    pub fn identity(&self) -> Option<&str> {
        self.target.as_ref().map(|target| target.identity.as_str())
    }

    /// Room the current or last requested connection is bound to.
    pub fn room(&self) -> Option<&str> {
        self.target.as_ref().map(|target| target.room.as_str())
    }

    /// Connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Server endpoint.
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// Number of scheduled timers (connect timeout and retry).
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Earliest instant at which [`Self::tick`] has work to do.
    pub fn next_deadline(&self) -> Option<I> {
        self.timers.next_deadline()
    }

    /// Subscribe to decoded inbound messages.
    pub fn on_message<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&InboundMessage) -> HandlerResult + Send + 'static,
    {
        self.messages.subscribe(handler)
    }

    /// Subscribe to lifecycle and send errors.
    pub fn on_error<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&ConnectionError) -> HandlerResult + Send + 'static,
    {
        self.errors.subscribe(handler)
    }

    /// Subscribe to status changes.
    pub fn on_status<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&str) -> HandlerResult + Send + 'static,
    {
        self.statuses.subscribe(handler)
    }

    /// Remove a message handler.
    pub fn remove_message_handler(&mut self, id: SubscriptionId) -> bool {
        self.messages.unsubscribe(id)
    }

    /// Remove an error handler.
    pub fn remove_error_handler(&mut self, id: SubscriptionId) -> bool {
        self.errors.unsubscribe(id)
    }

    /// Remove a status handler.
    pub fn remove_status_handler(&mut self, id: SubscriptionId) -> bool {
        self.statuses.unsubscribe(id)
    }

    /// Open a connection for `identity` in `room`.
    ///
    /// Tears down any live transport and pending retry first. The outcome is
    /// reported later as [`ConnectionAction::Ready`] or
    /// [`ConnectionAction::ConnectFailed`].
    ///
    /// # Errors
    ///
    /// - `ConnectionError::EmptyIdentity` if `identity` is blank
    pub fn connect(
        &mut self,
        identity: &str,
        room: &str,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if identity.trim().is_empty() {
            return Err(ConnectionError::EmptyIdentity);
        }

        let mut actions = self.teardown("Reconnecting");
        self.retry_count = 0;
        self.target = Some(Target { identity: identity.to_string(), room: room.to_string() });
        actions.extend(self.open_attempt(Origin::Caller, now));
        Ok(actions)
    }

    /// Close the connection and stop any reconnect loop.
    ///
    /// Idempotent: a second call returns no actions and changes nothing.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let was_pending_caller =
            self.state == ConnectionState::Connecting && self.origin == Origin::Caller;
        let changed = self.state != ConnectionState::Idle || self.target.is_some();

        let mut actions = self.teardown("User disconnect");
        self.state = ConnectionState::Idle;
        self.retry_count = 0;
        self.target = None;

        if was_pending_caller {
            actions.push(ConnectionAction::ConnectFailed(ConnectionError::Cancelled));
        }
        if changed {
            tracing::debug!("disconnected");
            self.set_status(STATUS_DISCONNECTED);
        }
        actions
    }

    /// Write a chat message to the open transport.
    ///
    /// Returns false without touching the sink when nothing is open. Send
    /// failures are published to error subscribers and also return false.
    pub fn send(&mut self, body: &str, room: &str, sink: &mut impl FrameSink) -> bool {
        let transport = match (self.state, self.transport) {
            (ConnectionState::Open, Some(transport)) => transport,
            _ => {
                tracing::debug!(state = ?self.state, "send while not connected");
                self.errors.publish(&ConnectionError::NotConnected);
                return false;
            },
        };

        let result = ClientFrame::message(body, room)
            .encode()
            .map_err(ConnectionError::from)
            .and_then(|text| sink.send_text(transport, text).map_err(ConnectionError::from));

        match result {
            Ok(()) => true,
            Err(error) => {
                let error = match error {
                    ConnectionError::Transport(reason) => ConnectionError::SendFailure(reason),
                    other => other,
                };
                tracing::warn!(%transport, %error, "send failed");
                self.errors.publish(&error);
                false
            },
        }
    }

    /// Process a transport event.
    ///
    /// Events for any transport other than the current one are dropped.
    pub fn handle_event(&mut self, event: TransportEvent, now: I) -> Vec<ConnectionAction> {
        if self.transport != Some(event.transport()) {
            tracing::trace!(transport = %event.transport(), "ignoring stale transport event");
            return Vec::new();
        }

        match event {
            TransportEvent::Opened { transport } => self.handle_opened(transport),
            TransportEvent::Frame { text, .. } => self.handle_frame(&text),
            TransportEvent::Error { transport, reason } => self.handle_error(transport, reason),
            TransportEvent::Closed { code, .. } => self.handle_closed(code, now),
        }
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        for (_, timer) in self.timers.expire(now) {
            match timer {
                ConnectionTimer::ConnectTimeout => actions.extend(self.handle_connect_timeout(now)),
                ConnectionTimer::Retry => actions.extend(self.handle_retry(now)),
            }
        }
        actions
    }

    fn handle_opened(&mut self, transport: TransportId) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        self.timers.cancel_all();
        self.state = ConnectionState::Open;
        self.retry_count = 0;
        self.attempt_failed = false;
        tracing::info!(%transport, room = ?self.room(), "connected");
        self.set_status(STATUS_CONNECTED);
        vec![ConnectionAction::Ready { transport }]
    }

    fn handle_frame(&mut self, text: &str) -> Vec<ConnectionAction> {
        if !matches!(self.state, ConnectionState::Open | ConnectionState::Closing) {
            return Vec::new();
        }

        match InboundMessage::decode(text) {
            Ok(message) => {
                self.messages.publish(&message);
                vec![ConnectionAction::Deliver(message)]
            },
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable frame");
                Vec::new()
            },
        }
    }

    fn handle_error(&mut self, transport: TransportId, reason: String) -> Vec<ConnectionAction> {
        tracing::warn!(%transport, %reason, state = ?self.state, "transport error");

        match self.state {
            ConnectionState::Connecting => {
                self.timers.cancel_all();
                self.state = ConnectionState::Closing;
                let mut actions = vec![close_action(transport, CloseCode::GOING_AWAY, &reason)];
                if self.origin == Origin::Caller {
                    self.attempt_failed = true;
                    actions.push(ConnectionAction::ConnectFailed(
                        ConnectionError::ConnectFailure(reason),
                    ));
                }
                actions
            },
            ConnectionState::Open => {
                self.state = ConnectionState::Closing;
                vec![close_action(transport, CloseCode::GOING_AWAY, &reason)]
            },
            _ => Vec::new(),
        }
    }

    fn handle_closed(&mut self, code: CloseCode, now: I) -> Vec<ConnectionAction> {
        self.transport = None;
        self.timers.cancel_all();
        let attempt_failed = std::mem::take(&mut self.attempt_failed);

        match (self.state, self.origin) {
            (ConnectionState::Connecting, Origin::Caller) => {
                self.state = ConnectionState::Idle;
                self.set_status(STATUS_DISCONNECTED);
                vec![ConnectionAction::ConnectFailed(ConnectionError::ConnectFailure(format!(
                    "closed before ready (code {code})"
                )))]
            },
            (ConnectionState::Closing, Origin::Caller) if attempt_failed => {
                self.state = ConnectionState::Idle;
                self.set_status(STATUS_DISCONNECTED);
                Vec::new()
            },
            (ConnectionState::Open, _) if code.is_normal() => {
                tracing::info!("server closed the connection normally");
                self.state = ConnectionState::Idle;
                self.target = None;
                self.set_status(STATUS_DISCONNECTED);
                Vec::new()
            },
            _ => {
                let error = ConnectionError::AbnormalClosure { code: code.0 };
                tracing::warn!(%error, "connection lost");
                self.schedule_retry(now)
            },
        }
    }

    fn handle_connect_timeout(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if let Some(transport) = self.transport.take() {
            actions.push(close_action(transport, CloseCode::NORMAL, "Connection timeout"));
        }

        let elapsed = self.config.connect_timeout;
        tracing::warn!(?elapsed, origin = ?self.origin, "connect timed out");

        match self.origin {
            Origin::Caller => {
                self.state = ConnectionState::Idle;
                self.set_status(STATUS_DISCONNECTED);
                actions.push(ConnectionAction::ConnectFailed(ConnectionError::ConnectTimeout {
                    elapsed,
                }));
            },
            Origin::Retry => actions.extend(self.schedule_retry(now)),
        }
        actions
    }

    fn handle_retry(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Reconnecting {
            return Vec::new();
        }
        self.open_attempt(Origin::Retry, now)
    }

    /// Retry if budget remains, otherwise give up and report exhaustion.
    fn schedule_retry(&mut self, now: I) -> Vec<ConnectionAction> {
        let max = self.config.max_retries;
        if self.retry_count < max && self.target.is_some() {
            self.retry_count += 1;
            self.state = ConnectionState::Reconnecting;
            self.timers.schedule(now + self.config.retry_delay, ConnectionTimer::Retry);
            tracing::info!(attempt = self.retry_count, max, "scheduling reconnect");
            self.set_status(&format!("Reconnecting... ({}/{max})", self.retry_count));
            return Vec::new();
        }

        let error = ConnectionError::RetryExhausted { attempts: max };
        tracing::error!(%error, "giving up on reconnect");
        self.state = ConnectionState::Idle;
        self.target = None;
        self.set_status(STATUS_DISCONNECTED);
        self.errors.publish(&error);
        vec![ConnectionAction::Failed(error)]
    }

    fn open_attempt(&mut self, origin: Origin, now: I) -> Vec<ConnectionAction> {
        let Some(target) = &self.target else {
            return Vec::new();
        };
        let url = self.endpoint.socket_url(&target.identity, &target.room);

        self.next_transport += 1;
        let transport = TransportId(self.next_transport);
        self.transport = Some(transport);
        self.origin = origin;
        self.attempt_failed = false;
        self.state = ConnectionState::Connecting;
        self.timers.schedule(now + self.config.connect_timeout, ConnectionTimer::ConnectTimeout);

        tracing::debug!(%transport, %url, ?origin, "opening transport");
        if origin == Origin::Caller {
            self.set_status(STATUS_CONNECTING);
        }
        vec![ConnectionAction::Open { transport, url }]
    }

    /// Close the live transport and drop all timers. Outcomes for a
    /// superseded attempt are never reported.
    fn teardown(&mut self, reason: &str) -> Vec<ConnectionAction> {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled pending timers");
        }
        self.attempt_failed = false;
        self.transport
            .take()
            .map(|transport| close_action(transport, CloseCode::NORMAL, reason))
            .into_iter()
            .collect()
    }

    fn set_status(&mut self, status: &str) {
        if self.status == status {
            return;
        }
        self.status = status.to_string();
        self.statuses.publish(status);
    }
}

fn close_action(transport: TransportId, code: CloseCode, reason: &str) -> ConnectionAction {
    ConnectionAction::Close { transport, code, reason: reason.to_string() }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Instant,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        written: Vec<(TransportId, String)>,
        fail: bool,
    }

    impl FrameSink for RecordingSink {
        fn send_text(&mut self, transport: TransportId, text: String) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket closed"));
            }
            self.written.push((transport, text));
            Ok(())
        }
    }

    fn manager(max_retries: u32) -> ConnectionManager<Instant> {
        let config = ConnectionConfig::default().with_max_retries(max_retries);
        ConnectionManager::new(config, EndpointConfig::new("chat.test"))
    }

    fn opened(actions: &[ConnectionAction]) -> TransportId {
        actions
            .iter()
            .find_map(|action| match action {
                ConnectionAction::Open { transport, .. } => Some(*transport),
                _ => None,
            })
            .expect("expected an Open action")
    }

    fn record_statuses(manager: &mut ConnectionManager<Instant>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.on_status(move |status: &str| {
            sink.lock().map_err(|e| e.to_string())?.push(status.to_string());
            Ok(())
        });
        seen
    }

    fn record_errors(manager: &mut ConnectionManager<Instant>) -> Arc<Mutex<Vec<ConnectionError>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.on_error(move |error: &ConnectionError| {
            sink.lock().map_err(|e| e.to_string())?.push(error.clone());
            Ok(())
        });
        seen
    }

    fn open(manager: &mut ConnectionManager<Instant>, now: Instant) -> TransportId {
        let actions = manager.connect("alice", "general", now).unwrap();
        let transport = opened(&actions);
        let actions = manager.handle_event(TransportEvent::Opened { transport }, now);
        assert_eq!(actions, vec![ConnectionAction::Ready { transport }]);
        transport
    }

    #[test]
    fn connect_opens_socket_url() {
        let mut manager = manager(5);
        let actions = manager.connect("alice", "general", Instant::now()).unwrap();

        assert_eq!(actions.len(), 1);
        match &actions[0] {
            ConnectionAction::Open { url, .. } => {
                assert_eq!(url, "ws://chat.test/ws/alice?room_id=general");
            },
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.status(), "Connecting");
        assert_eq!(manager.pending_timers(), 1);
    }

    #[test]
    fn connect_rejects_blank_identity() {
        let mut manager = manager(5);
        assert_eq!(
            manager.connect("  ", "general", Instant::now()),
            Err(ConnectionError::EmptyIdentity)
        );
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[test]
    fn opened_clears_timeout_and_resets_retries() {
        let mut manager = manager(5);
        let t0 = Instant::now();
        open(&mut manager, t0);

        assert!(manager.is_open());
        assert_eq!(manager.status(), "Connected");
        assert_eq!(manager.retry_count(), 0);
        assert_eq!(manager.next_deadline(), None);
    }

    #[test]
    fn retries_are_bounded() {
        let mut manager = manager(3);
        let statuses = record_statuses(&mut manager);
        let errors = record_errors(&mut manager);
        let delay = manager.config().retry_delay;
        let mut now = Instant::now();
        let mut transport = open(&mut manager, now);

        for attempt in 1..=3 {
            let actions = manager.handle_event(
                TransportEvent::Closed { transport, code: CloseCode::ABNORMAL },
                now,
            );
            assert!(actions.is_empty());
            assert_eq!(manager.state(), ConnectionState::Reconnecting);
            assert_eq!(manager.retry_count(), attempt);
            assert_eq!(manager.next_deadline(), Some(now + delay));

            now += delay;
            let actions = manager.tick(now);
            transport = opened(&actions);
            assert_eq!(manager.state(), ConnectionState::Connecting);
        }

        let actions =
            manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL }, now);
        let exhausted = ConnectionError::RetryExhausted { attempts: 3 };
        assert_eq!(actions, vec![ConnectionAction::Failed(exhausted.clone())]);
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert_eq!(manager.next_deadline(), None);
        assert_eq!(*errors.lock().unwrap(), vec![exhausted]);

        let statuses = statuses.lock().unwrap();
        assert_eq!(
            *statuses,
            vec![
                "Connecting",
                "Connected",
                "Reconnecting... (1/3)",
                "Reconnecting... (2/3)",
                "Reconnecting... (3/3)",
                "Disconnected",
            ]
        );
    }

    #[test]
    fn successful_retry_resets_counter() {
        let mut manager = manager(3);
        let delay = manager.config().retry_delay;
        let now = Instant::now();
        let transport = open(&mut manager, now);

        manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL }, now);
        let actions = manager.tick(now + delay);
        let retry = opened(&actions);
        let actions = manager.handle_event(TransportEvent::Opened { transport: retry }, now + delay);

        assert_eq!(actions, vec![ConnectionAction::Ready { transport: retry }]);
        assert_eq!(manager.retry_count(), 0);
        assert_eq!(manager.status(), "Connected");
    }

    #[test]
    fn normal_close_does_not_retry() {
        let mut manager = manager(3);
        let now = Instant::now();
        let transport = open(&mut manager, now);

        let actions =
            manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::NORMAL }, now);
        assert!(actions.is_empty());
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert_eq!(manager.next_deadline(), None);
    }

    #[test]
    fn disconnect_twice_is_noop() {
        let mut manager = manager(3);
        let statuses = record_statuses(&mut manager);
        let errors = record_errors(&mut manager);
        let transport = open(&mut manager, Instant::now());

        let actions = manager.disconnect();
        assert_eq!(
            actions,
            vec![ConnectionAction::Close {
                transport,
                code: CloseCode::NORMAL,
                reason: "User disconnect".to_string(),
            }]
        );
        let after_first = statuses.lock().unwrap().len();

        assert!(manager.disconnect().is_empty());
        assert_eq!(statuses.lock().unwrap().len(), after_first);
        assert!(errors.lock().unwrap().is_empty());
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[test]
    fn disconnect_cancels_pending_retry() {
        let mut manager = manager(3);
        let delay = manager.config().retry_delay;
        let now = Instant::now();
        let transport = open(&mut manager, now);

        manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL }, now);
        assert_eq!(manager.pending_timers(), 1);

        assert!(manager.disconnect().is_empty());
        assert_eq!(manager.pending_timers(), 0);
        assert!(manager.tick(now + delay * 2).is_empty());
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[test]
    fn disconnect_cancels_pending_connect() {
        let mut manager = manager(3);
        let actions = manager.connect("alice", "general", Instant::now()).unwrap();
        let transport = opened(&actions);

        let actions = manager.disconnect();
        assert!(actions.contains(&ConnectionAction::ConnectFailed(ConnectionError::Cancelled)));
        assert!(
            manager
                .handle_event(TransportEvent::Opened { transport }, Instant::now())
                .is_empty()
        );
    }

    #[test]
    fn new_connect_cancels_pending_retry() {
        let mut manager = manager(3);
        let delay = manager.config().retry_delay;
        let now = Instant::now();
        let transport = open(&mut manager, now);

        manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL }, now);
        let actions = manager.connect("alice", "random", now).unwrap();
        let fresh = opened(&actions);
        manager.handle_event(TransportEvent::Opened { transport: fresh }, now);

        assert!(manager.tick(now + delay * 2).is_empty());
        assert_eq!(manager.room(), Some("random"));
        assert!(manager.is_open());
    }

    #[test]
    fn stale_events_are_ignored() {
        let mut manager = manager(3);
        let now = Instant::now();
        let old = open(&mut manager, now);
        let actions = manager.connect("alice", "random", now).unwrap();
        assert!(actions.contains(&ConnectionAction::Close {
            transport: old,
            code: CloseCode::NORMAL,
            reason: "Reconnecting".to_string(),
        }));

        let late = manager.handle_event(
            TransportEvent::Closed { transport: old, code: CloseCode::ABNORMAL },
            now,
        );
        assert!(late.is_empty());
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.retry_count(), 0);
    }

    #[test]
    fn caller_timeout_is_not_retried() {
        let mut manager = manager(3);
        let timeout = manager.config().connect_timeout;
        let now = Instant::now();
        let actions = manager.connect("alice", "general", now).unwrap();
        let transport = opened(&actions);

        let actions = manager.tick(now + timeout);
        assert_eq!(
            actions,
            vec![
                ConnectionAction::Close {
                    transport,
                    code: CloseCode::NORMAL,
                    reason: "Connection timeout".to_string(),
                },
                ConnectionAction::ConnectFailed(ConnectionError::ConnectTimeout {
                    elapsed: timeout
                }),
            ]
        );
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert_eq!(manager.next_deadline(), None);
    }

    #[test]
    fn caller_error_fails_without_retry() {
        let mut manager = manager(3);
        let now = Instant::now();
        let actions = manager.connect("alice", "general", now).unwrap();
        let transport = opened(&actions);

        let actions = manager.handle_event(
            TransportEvent::Error { transport, reason: "refused".to_string() },
            now,
        );
        assert!(actions.contains(&ConnectionAction::ConnectFailed(
            ConnectionError::ConnectFailure("refused".to_string())
        )));

        let actions =
            manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL }, now);
        assert!(actions.is_empty());
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert_eq!(manager.next_deadline(), None);
    }

    #[test]
    fn error_while_open_enters_retry_loop() {
        let mut manager = manager(3);
        let now = Instant::now();
        let transport = open(&mut manager, now);

        let actions = manager.handle_event(
            TransportEvent::Error { transport, reason: "reset".to_string() },
            now,
        );
        assert_eq!(
            actions,
            vec![ConnectionAction::Close {
                transport,
                code: CloseCode::GOING_AWAY,
                reason: "reset".to_string(),
            }]
        );
        assert_eq!(manager.state(), ConnectionState::Closing);

        manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::GOING_AWAY }, now);
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(manager.retry_count(), 1);
    }

    #[test]
    fn retry_timeout_counts_against_budget() {
        let mut manager = manager(1);
        let config = manager.config().clone();
        let mut now = Instant::now();
        let transport = open(&mut manager, now);

        manager.handle_event(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL }, now);
        now += config.retry_delay;
        let actions = manager.tick(now);
        opened(&actions);

        now += config.connect_timeout;
        let actions = manager.tick(now);
        assert!(actions.contains(&ConnectionAction::Failed(ConnectionError::RetryExhausted {
            attempts: 1
        })));
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[test]
    fn frames_are_published_and_delivered() {
        let mut manager = manager(3);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        manager.on_message(move |message: &InboundMessage| {
            sink.lock().map_err(|e| e.to_string())?.push(message.body.clone());
            Ok(())
        });
        let now = Instant::now();
        let transport = open(&mut manager, now);

        let text = r#"{"username":"bob","message":"hey","timestamp":"2024-01-01T00:00:00Z","message_type":"message","room_id":"general"}"#;
        let actions =
            manager.handle_event(TransportEvent::Frame { transport, text: text.to_string() }, now);

        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], ConnectionAction::Deliver(message) if message.sender == "bob"));
        assert_eq!(*received.lock().unwrap(), vec!["hey".to_string()]);

        let garbage = manager
            .handle_event(TransportEvent::Frame { transport, text: "{not json".to_string() }, now);
        assert!(garbage.is_empty());
    }

    #[test]
    fn send_writes_message_frame() {
        let mut manager = manager(3);
        let transport = open(&mut manager, Instant::now());
        let mut sink = RecordingSink::default();

        assert!(manager.send("hi", "general", &mut sink));
        assert_eq!(sink.written, vec![(
            transport,
            r#"{"type":"message","message":"hi","room_id":"general"}"#.to_string()
        )]);
    }

    #[test]
    fn send_while_disconnected_fails_without_writing() {
        let mut manager = manager(3);
        let errors = record_errors(&mut manager);
        let mut sink = RecordingSink::default();

        assert!(!manager.send("hi", "general", &mut sink));
        assert!(sink.written.is_empty());
        assert_eq!(*errors.lock().unwrap(), vec![ConnectionError::NotConnected]);
    }

    #[test]
    fn write_failure_reports_send_failure() {
        let mut manager = manager(3);
        let errors = record_errors(&mut manager);
        open(&mut manager, Instant::now());
        let mut sink = RecordingSink { fail: true, ..RecordingSink::default() };

        assert!(!manager.send("hi", "general", &mut sink));
        let errors = errors.lock().unwrap();
        assert!(matches!(errors.as_slice(), [ConnectionError::SendFailure(_)]));
    }

    #[test]
    fn removed_handler_stops_receiving() {
        let mut manager = manager(3);
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let id = manager.on_status(move |_: &str| {
            *counter.lock().map_err(|e| e.to_string())? += 1;
            Ok(())
        });

        assert!(manager.remove_status_handler(id));
        open(&mut manager, Instant::now());
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
