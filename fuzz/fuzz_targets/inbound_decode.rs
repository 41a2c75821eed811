//! Fuzz target for inbound frame decoding
//!
//! Arbitrary socket text must decode or fail cleanly, never panic.
//!
//! # Invariants
//!
//! - `room()` never returns an empty name
//! - An empty `room_id` reads as absent

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomlink_proto::InboundMessage;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(message) = InboundMessage::decode(text) else {
        return;
    };

    if let Some(room) = message.room() {
        assert!(!room.is_empty(), "room() returned an empty name");
    }
    if message.room_id.as_deref() == Some("") {
        assert!(message.room().is_none());
    }
});
