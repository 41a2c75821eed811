//! Client configuration.

use std::time::Duration;

use roomlink_core::{ConnectionConfig, ConnectionManager, env::TimePoint};
use roomlink_proto::EndpointConfig;
use roomlink_session::{Limits, Session, SessionConfig};

/// Upper bound on one room catalog request.
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_millis(5000);

/// Everything needed to build a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server address and scheme.
    pub endpoint: EndpointConfig,
    /// Retry and timeout settings.
    pub connection: ConnectionConfig,
    /// Validation limits and catalog debounce.
    pub session: SessionConfig,
    /// Time allowed for a catalog fetch before it is abandoned.
    pub catalog_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            connection: ConnectionConfig::default(),
            session: SessionConfig::default(),
            catalog_timeout: DEFAULT_CATALOG_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Configuration for `host` with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self { endpoint: EndpointConfig::new(host), ..Self::default() }
    }

    /// Use `wss`/`https`.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.endpoint = self.endpoint.with_secure(secure);
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.connection = self.connection.with_max_retries(max_retries);
        self
    }

    /// Set the delay between reconnect attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.connection = self.connection.with_retry_delay(delay);
        self
    }

    /// Set the readiness timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connection = self.connection.with_connect_timeout(timeout);
        self
    }

    /// Set the catalog request timeout.
    pub fn with_catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = timeout;
        self
    }

    /// Set the validation limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.session = self.session.with_limits(limits);
        self
    }

    /// Build a logged-out session.
    pub fn build_session<I: TimePoint>(&self) -> Session<I> {
        let connection = ConnectionManager::new(self.connection.clone(), self.endpoint.clone());
        Session::new(connection, self.session.clone())
    }
}
