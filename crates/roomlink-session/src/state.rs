//! Observable session state.
//!
//! [`SessionState`] is the view model a front-end renders from: who is logged
//! in, which room is active, every room's history and the last catalog
//! fetched from the server. Only [`crate::Session`] mutates it.

use std::collections::{BTreeSet, HashMap};

use roomlink_proto::{InboundMessage, RoomSummary};

/// Messages received for one room during this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomHistory {
    /// Room name.
    pub room_id: String,
    /// Messages in arrival order.
    pub messages: Vec<InboundMessage>,
    /// Messages appended since the room was last active or marked read.
    pub unread: usize,
}

impl RoomHistory {
    /// Empty history.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self { room_id: room_id.into(), messages: Vec::new(), unread: 0 }
    }
}

/// State of a logged-in session.
///
/// Created on login and dropped on logout.
///
/// # Invariants
///
/// - The active room always has a history and its unread counter is zero.
/// - Histories are append-only and never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    identity: String,
    active_room: String,
    histories: HashMap<String, RoomHistory>,
    known_rooms: Vec<RoomSummary>,
}

impl SessionState {
    pub(crate) fn new(identity: &str, active_room: &str) -> Self {
        let mut state = Self {
            identity: identity.to_string(),
            active_room: String::new(),
            histories: HashMap::new(),
            known_rooms: Vec::new(),
        };
        state.activate(active_room);
        state
    }

    /// Logged-in identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Room messages are sent to.
    pub fn active_room(&self) -> &str {
        &self.active_room
    }

    /// History for `room`, if it was ever referenced.
    pub fn history(&self, room: &str) -> Option<&RoomHistory> {
        self.histories.get(room)
    }

    /// Every room history, keyed by room name.
    pub fn histories(&self) -> &HashMap<String, RoomHistory> {
        &self.histories
    }

    /// Unread count for `room`, zero if unknown.
    pub fn unread(&self, room: &str) -> usize {
        self.histories.get(room).map_or(0, |history| history.unread)
    }

    /// Sum of unread counters across all rooms.
    pub fn total_unread(&self) -> usize {
        self.histories.values().map(|history| history.unread).sum()
    }

    /// Last catalog fetched from the server.
    pub fn known_rooms(&self) -> &[RoomSummary] {
        &self.known_rooms
    }

    /// Rooms a front-end should list.
    ///
    /// The catalog when it is non-empty, otherwise every room with a local
    /// history, sorted by name and with no members.
    pub fn rooms_to_display(&self) -> Vec<RoomSummary> {
        if !self.known_rooms.is_empty() {
            return self.known_rooms.clone();
        }
        let names: BTreeSet<&String> = self.histories.keys().collect();
        names.into_iter().map(|name| RoomSummary::empty(name.clone())).collect()
    }

    /// Make `room` active and clear its unread counter.
    pub(crate) fn activate(&mut self, room: &str) {
        self.active_room = room.to_string();
        self.history_mut(room).unread = 0;
    }

    /// Append `message` to `room`. Counts it as unread unless `room` is active.
    pub(crate) fn append(&mut self, room: &str, message: InboundMessage) {
        let active = room == self.active_room;
        let history = self.history_mut(room);
        history.messages.push(message);
        if !active {
            history.unread += 1;
        }
    }

    /// Clear `room`'s unread counter. Returns false for unknown rooms.
    pub(crate) fn mark_read(&mut self, room: &str) -> bool {
        match self.histories.get_mut(room) {
            Some(history) => {
                history.unread = 0;
                true
            },
            None => false,
        }
    }

    pub(crate) fn set_catalog(&mut self, rooms: Vec<RoomSummary>) {
        self.known_rooms = rooms;
    }

    fn history_mut(&mut self, room: &str) -> &mut RoomHistory {
        self.histories.entry(room.to_string()).or_insert_with(|| RoomHistory::new(room))
    }
}
