//! Environment abstraction for deterministic testing.
//!
//! Decouples the state machines from the system clock. Production drivers use
//! tokio's clock; tests use a paused clock or plain `std::time::Instant`
//! values they advance by hand.

use std::{
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// A point in time the state machines can schedule against.
///
/// Blanket-implemented for every type with the required arithmetic, which
/// covers both `std::time::Instant` and `tokio::time::Instant`.
pub trait TimePoint:
    Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = Self>
{
}

impl<T> TimePoint for T where
    T: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = T>
{
}

/// Abstract environment providing time and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    type Instant: TimePoint;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls never return an earlier instant.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps; the state machines never do.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Time left until `deadline`, zero if it has passed.
    fn until(&self, deadline: Self::Instant) -> Duration {
        let now = self.now();
        if deadline > now { deadline - now } else { Duration::ZERO }
    }
}
