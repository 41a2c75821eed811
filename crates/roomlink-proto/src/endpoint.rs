//! Server addressing.
//!
//! The socket is keyed by identity and room: `/ws/{identity}?room_id={room}`.
//! The room catalog lives at `/api/rooms` on the same host. Scheme selection
//! follows the `secure` flag for both (`wss`/`https` or `ws`/`http`).

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost:8003";

/// Where the chat server lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// `host:port` of the chat server.
    pub host: String,
    /// Use TLS (`wss`, `https`).
    pub secure: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.to_string(), secure: false }
    }
}

impl EndpointConfig {
    /// Plain-text endpoint on `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), secure: false }
    }

    /// Toggle TLS.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Socket URL for `identity` in `room`.
    pub fn socket_url(&self, identity: &str, room: &str) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!(
            "{scheme}://{}/ws/{}?room_id={}",
            self.host,
            urlencoding::encode(identity),
            urlencoding::encode(room)
        )
    }

    /// Room catalog URL.
    pub fn rooms_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}/api/rooms", self.host)
    }
}
