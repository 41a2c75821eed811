//! Production environment backed by tokio's clock.
//!
//! Using `tokio::time::Instant` rather than the std clock lets tests pause and
//! advance time with `tokio::time::pause`.

use std::{future::Future, time::Duration};

use roomlink_core::env::Environment;

/// Production environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
