//! Ordered handler lists.
//!
//! Handlers are keyed by a [`SubscriptionId`] and run in registration order.
//! A handler reports failure by returning an error; the failure is logged and
//! the remaining handlers still run.

use std::{collections::BTreeMap, fmt};

/// Error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by every handler.
pub type HandlerResult = Result<(), HandlerError>;

type Handler<T> = Box<dyn FnMut(&T) -> HandlerResult + Send>;

/// Handle returned by [`Subscribers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Handlers for one kind of event.
pub struct Subscribers<T: ?Sized> {
    next_id: u64,
    handlers: BTreeMap<SubscriptionId, Handler<T>>,
}

impl<T: ?Sized> Default for Subscribers<T> {
    fn default() -> Self {
        Self { next_id: 0, handlers: BTreeMap::new() }
    }
}

impl<T: ?Sized> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers").field("handlers", &self.handlers.len()).finish()
    }
}

impl<T: ?Sized> Subscribers<T> {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`. Registering the same closure twice yields two
    /// independent entries.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&T) -> HandlerResult + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.handlers.insert(id, Box::new(handler));
        id
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// No handlers registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every handler with `item`. Returns the number that failed.
    pub fn publish(&mut self, item: &T) -> usize {
        let mut failures = 0;
        for (id, handler) in &mut self.handlers {
            if let Err(error) = handler(item) {
                failures += 1;
                tracing::warn!(subscription = id.0, %error, "subscriber failed");
            }
        }
        failures
    }
}
