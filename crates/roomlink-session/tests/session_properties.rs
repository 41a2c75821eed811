//! Property-based tests for the session state machine.
//!
//! Arbitrary interleavings of inbound messages, room switches and read marks
//! are checked against a simple model of per-room histories.

use std::{collections::HashMap, time::Instant};

use proptest::prelude::*;
use roomlink_core::{ConnectionConfig, ConnectionManager, TransportEvent};
use roomlink_proto::EndpointConfig;
use roomlink_session::{Session, SessionAction, SessionConfig};

const ROOMS: [&str; 3] = ["general", "random", "dev"];

#[derive(Debug, Clone)]
enum Step {
    Receive { room: usize, body: u32 },
    Switch { room: usize },
    MarkRead { room: usize },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => (0..ROOMS.len(), any::<u32>()).prop_map(|(room, body)| Step::Receive { room, body }),
        1 => (0..ROOMS.len()).prop_map(|room| Step::Switch { room }),
        1 => (0..ROOMS.len()).prop_map(|room| Step::MarkRead { room }),
    ]
}

fn frame(room: &str, body: u32) -> String {
    format!(
        r#"{{"username":"bob","message":"{body}","timestamp":"t","message_type":"message","room_id":"{room}"}}"#
    )
}

/// Settle a pending login or switch by reporting the transport as open.
fn settle(session: &mut Session<Instant>, actions: &[SessionAction], now: Instant) {
    let Some(transport) = actions.iter().find_map(|action| match action {
        SessionAction::Open { transport, .. } => Some(*transport),
        _ => None,
    }) else {
        return;
    };
    let _ = session.handle_transport_event(TransportEvent::Opened { transport }, now);
}

fn logged_in(now: Instant) -> Option<Session<Instant>> {
    let connection =
        ConnectionManager::new(ConnectionConfig::default(), EndpointConfig::new("chat.test"));
    let mut session = Session::new(connection, SessionConfig::default());
    let actions = session.login("alice", "general", now).ok()?;
    settle(&mut session, &actions, now);
    Some(session)
}

#[derive(Default)]
struct Model {
    messages: HashMap<&'static str, Vec<String>>,
    unread: HashMap<&'static str, usize>,
}

proptest! {
    #[test]
    fn prop_history_order_and_unread_match_model(
        steps in prop::collection::vec(step_strategy(), 0..60),
    ) {
        let now = Instant::now();
        let mut session = logged_in(now).ok_or_else(|| TestCaseError::fail("login failed"))?;
        let mut model = Model::default();
        let mut active = "general";

        for step in steps {
            match step {
                Step::Receive { room, body } => {
                    let room = ROOMS[room];
                    let transport = session
                        .connection()
                        .transport()
                        .ok_or_else(|| TestCaseError::fail("no transport"))?;
                    let event = TransportEvent::Frame { transport, text: frame(room, body) };
                    let _ = session.handle_transport_event(event, now);

                    model.messages.entry(room).or_default().push(body.to_string());
                    if room != active {
                        *model.unread.entry(room).or_default() += 1;
                    }
                },
                Step::Switch { room } => {
                    let room = ROOMS[room];
                    let actions = session.switch_room(room, now)
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    settle(&mut session, &actions, now);
                    active = room;
                    model.unread.insert(room, 0);
                },
                Step::MarkRead { room } => {
                    let room = ROOMS[room];
                    session.mark_room_as_read(room);
                    model.unread.insert(room, 0);
                },
            }

            let state = session.state().ok_or_else(|| TestCaseError::fail("logged out"))?;
            prop_assert_eq!(state.active_room(), active);
            prop_assert_eq!(state.unread(active), 0);

            for room in ROOMS {
                let bodies: Vec<String> = state
                    .history(room)
                    .map(|history| history.messages.iter().map(|m| m.body.clone()).collect())
                    .unwrap_or_default();
                let expected = model.messages.get(room).cloned().unwrap_or_default();
                prop_assert_eq!(bodies, expected);
                prop_assert_eq!(state.unread(room), model.unread.get(room).copied().unwrap_or(0));
            }
        }
    }

    #[test]
    fn prop_total_unread_is_sum_of_rooms(
        rooms in prop::collection::vec(0..ROOMS.len(), 0..40),
    ) {
        let now = Instant::now();
        let mut session = logged_in(now).ok_or_else(|| TestCaseError::fail("login failed"))?;

        for (i, room) in rooms.iter().enumerate() {
            let transport = session
                .connection()
                .transport()
                .ok_or_else(|| TestCaseError::fail("no transport"))?;
            let text = frame(ROOMS[*room], i as u32);
            let _ = session.handle_transport_event(TransportEvent::Frame { transport, text }, now);
        }

        let state = session.state().ok_or_else(|| TestCaseError::fail("logged out"))?;
        let sum: usize = ROOMS.iter().map(|room| state.unread(room)).sum();
        prop_assert_eq!(session.total_unread(), sum);
        let inactive = rooms.iter().filter(|room| **room != 0).count();
        prop_assert_eq!(sum, inactive);
    }
}
