//! Cancellable scheduled tasks.
//!
//! A [`Timers`] registry holds deadlines tagged with a caller-defined kind.
//! Nothing fires on its own: the owner asks for [`Timers::expire`] with the
//! current time and handles whatever comes back. Every entry can be cancelled
//! by its [`TimerId`], and [`Timers::cancel_all`] clears the registry so a
//! stale retry can never fire after a fresh connection.

use std::{collections::BTreeMap, fmt};

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Scheduled<I, K> {
    deadline: I,
    kind: K,
}

/// Registry of pending deadlines.
#[derive(Debug, Clone)]
pub struct Timers<I, K> {
    next_id: u64,
    pending: BTreeMap<TimerId, Scheduled<I, K>>,
}

impl<I, K> Default for Timers<I, K> {
    fn default() -> Self {
        Self { next_id: 0, pending: BTreeMap::new() }
    }
}

impl<I: Copy + Ord, K> Timers<I, K> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire at `deadline`.
    pub fn schedule(&mut self, deadline: I, kind: K) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert(id, Scheduled { deadline, kind });
        id
    }

    /// Cancel one task. Returns its kind if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> Option<K> {
        self.pending.remove(&id).map(|scheduled| scheduled.kind)
    }

    /// Cancel every pending task. Returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Whether `id` is still pending.
    pub fn contains(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// No pending tasks.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.pending.values().map(|scheduled| scheduled.deadline).min()
    }

    /// Remove and return every task due at or before `now`.
    ///
    /// Ordered by deadline, then by scheduling order.
    pub fn expire(&mut self, now: I) -> Vec<(TimerId, K)> {
        let mut due: Vec<(I, TimerId)> = self
            .pending
            .iter()
            .filter(|(_, scheduled)| scheduled.deadline <= now)
            .map(|(id, scheduled)| (scheduled.deadline, *id))
            .collect();
        due.sort();

        due.into_iter()
            .filter_map(|(_, id)| self.pending.remove(&id).map(|scheduled| (id, scheduled.kind)))
            .collect()
    }
}
