//! Fuzz target for the connection manager state machine
//!
//! Drives `ConnectionManager` with arbitrary caller operations, transport
//! events (current and stale) and clock jumps.
//!
//! # Invariants
//!
//! - At most one transport is live at any time
//! - Retry count never exceeds the configured maximum
//! - `Open` implies a current transport
//! - `Idle` leaves no timers pending

#![no_main]

use std::{
    collections::BTreeSet,
    io,
    time::{Duration, Instant},
};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomlink_core::{
    CloseCode, ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, FrameSink,
    TransportEvent, TransportId,
};
use roomlink_proto::EndpointConfig;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Connect { room: u8 },
    Disconnect,
    Send,
    Opened { stale: bool },
    Frame { stale: bool, text: String },
    Error { stale: bool },
    Closed { stale: bool, code: u16 },
    Advance { millis: u16 },
}

struct NullSink;

impl FrameSink for NullSink {
    fn send_text(&mut self, _: TransportId, _: String) -> io::Result<()> {
        Ok(())
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let config = ConnectionConfig::default()
        .with_max_retries(MAX_RETRIES)
        .with_retry_delay(Duration::from_millis(500))
        .with_connect_timeout(Duration::from_millis(2000));
    let mut manager = ConnectionManager::new(config, EndpointConfig::default());
    let mut now = Instant::now();
    let mut live: BTreeSet<TransportId> = BTreeSet::new();
    let mut last_seen = TransportId::new(0);

    for op in ops {
        let current = manager.transport();
        if let Some(transport) = current {
            last_seen = transport;
        }
        let target = |stale: bool| match (stale, current) {
            (false, Some(transport)) => transport,
            _ => TransportId::new(last_seen.get().wrapping_add(1000)),
        };

        let actions = match op {
            Op::Connect { room } => {
                manager.connect("fuzzer", &format!("room{room}"), now).unwrap_or_default()
            },
            Op::Disconnect => manager.disconnect(),
            Op::Send => {
                let sent = manager.send("hello", "room0", &mut NullSink);
                assert!(!sent || manager.state() == ConnectionState::Open);
                Vec::new()
            },
            Op::Opened { stale } => {
                manager.handle_event(TransportEvent::Opened { transport: target(stale) }, now)
            },
            Op::Frame { stale, text } => {
                manager.handle_event(TransportEvent::Frame { transport: target(stale), text }, now)
            },
            Op::Error { stale } => manager.handle_event(
                TransportEvent::Error { transport: target(stale), reason: "fuzz".to_string() },
                now,
            ),
            Op::Closed { stale, code } => {
                let transport = target(stale);
                live.remove(&transport);
                manager.handle_event(TransportEvent::Closed { transport, code: CloseCode(code) }, now)
            },
            Op::Advance { millis } => {
                now += Duration::from_millis(u64::from(millis));
                manager.tick(now)
            },
        };

        for action in actions {
            match action {
                ConnectionAction::Open { transport, .. } => {
                    live.insert(transport);
                },
                ConnectionAction::Close { transport, .. } => {
                    live.remove(&transport);
                },
                _ => {},
            }
        }

        assert!(live.len() <= 1, "more than one live transport: {live:?}");
        assert!(manager.retry_count() <= MAX_RETRIES);
        if manager.state() == ConnectionState::Open {
            assert!(manager.transport().is_some());
        }
        if manager.state() == ConnectionState::Idle {
            assert_eq!(manager.pending_timers(), 0);
        }
    }
});
