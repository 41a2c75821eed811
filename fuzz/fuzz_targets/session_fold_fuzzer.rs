//! Fuzz target for session message folding
//!
//! Logs in, then interleaves inbound frames for a handful of rooms with room
//! switches, read markers and dropped connections.
//!
//! # Invariants
//!
//! - The active room's unread counter is zero
//! - A room's unread counter never exceeds its message count
//! - Total unread equals the sum of per-room counters

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomlink_core::{CloseCode, ConnectionConfig, ConnectionManager, TransportEvent};
use roomlink_proto::EndpointConfig;
use roomlink_session::{Session, SessionAction, SessionConfig};

const ROOMS: [&str; 4] = ["general", "random", "dev", ""];

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Inbound { room: u8, kind: u8 },
    Switch { room: u8 },
    MarkRead { room: u8 },
    Drop,
    Advance { millis: u16 },
}

fuzz_target!(|ops: Vec<Op>| {
    let connection = ConnectionManager::new(ConnectionConfig::default(), EndpointConfig::default());
    let mut session = Session::new(connection, SessionConfig::default());
    let mut now = Instant::now();

    let Ok(actions) = session.login("fuzzer", "general", now) else {
        return;
    };
    open_all(&mut session, actions, now);

    for op in ops {
        let actions = match op {
            Op::Inbound { room, kind } => {
                let Some(transport) = session.connection().transport() else {
                    continue;
                };
                let kind = ["message", "system", "user_join", "user_leave"][usize::from(kind % 4)];
                let text = format!(
                    r#"{{"username":"bob","message":"hi","timestamp":"t","message_type":"{kind}","room_id":"{}"}}"#,
                    pick(room)
                );
                session.handle_transport_event(TransportEvent::Frame { transport, text }, now)
            },
            Op::Switch { room } => session.switch_room(pick(room), now).unwrap_or_default(),
            Op::MarkRead { room } => {
                session.mark_room_as_read(pick(room));
                Vec::new()
            },
            Op::Drop => match session.connection().transport() {
                Some(transport) => session.handle_transport_event(
                    TransportEvent::Closed { transport, code: CloseCode::ABNORMAL },
                    now,
                ),
                None => Vec::new(),
            },
            Op::Advance { millis } => {
                now += Duration::from_millis(u64::from(millis));
                session.tick(now)
            },
        };
        open_all(&mut session, actions, now);

        let Some(state) = session.state() else {
            continue;
        };
        assert_eq!(state.unread(state.active_room()), 0);
        let mut sum = 0;
        for history in state.histories().values() {
            assert!(history.unread <= history.messages.len());
            sum += history.unread;
        }
        assert_eq!(state.total_unread(), sum);
    }
});

fn pick(room: u8) -> &'static str {
    ROOMS[usize::from(room) % ROOMS.len()]
}

/// Every socket the session dials opens immediately.
fn open_all(session: &mut Session<Instant>, actions: Vec<SessionAction>, now: Instant) {
    let mut pending = actions;
    while !pending.is_empty() {
        let mut next = Vec::new();
        for action in pending {
            if let SessionAction::Open { transport, .. } = action {
                next.extend(session.handle_transport_event(TransportEvent::Opened { transport }, now));
            }
        }
        pending = next;
    }
}
