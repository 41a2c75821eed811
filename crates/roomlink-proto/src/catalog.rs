//! Room catalog entries returned by the listing endpoint.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One room known to the server and who is in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room name.
    pub room_id: String,
    /// Usernames currently present.
    #[serde(rename = "users", default)]
    pub members: BTreeSet<String>,
}

impl RoomSummary {
    /// Summary with no known members.
    pub fn empty(room_id: impl Into<String>) -> Self {
        Self { room_id: room_id.into(), members: BTreeSet::new() }
    }
}
