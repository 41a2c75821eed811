//! End-to-end session scenarios driven through the sans-IO interface.

use std::{
    io,
    sync::{Arc, Mutex},
    time::Instant,
};

use roomlink_core::{
    CloseCode, ConnectionConfig, ConnectionError, ConnectionManager, ConnectionState, FrameSink,
    TransportEvent, TransportId,
};
use roomlink_proto::EndpointConfig;
use roomlink_session::{
    NoticeLevel, Session, SessionAction, SessionConfig, SessionError, SessionNotice,
    ValidationError,
};

/// Records every frame written and every transport opened.
#[derive(Default)]
struct Wire {
    written: Vec<(TransportId, String)>,
    opened: Vec<(TransportId, String)>,
}

impl Wire {
    fn execute(&mut self, actions: &[SessionAction]) -> Option<TransportId> {
        let mut last = None;
        for action in actions {
            if let SessionAction::Open { transport, url } = action {
                self.opened.push((*transport, url.clone()));
                last = Some(*transport);
            }
        }
        last
    }
}

impl FrameSink for Wire {
    fn send_text(&mut self, transport: TransportId, text: String) -> io::Result<()> {
        self.written.push((transport, text));
        Ok(())
    }
}

fn session(max_retries: u32) -> Session<Instant> {
    let config = ConnectionConfig::default().with_max_retries(max_retries);
    let connection = ConnectionManager::new(config, EndpointConfig::new("chat.test"));
    Session::new(connection, SessionConfig::default())
}

fn notices(session: &mut Session<Instant>) -> Arc<Mutex<Vec<SessionNotice>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.on_notice(move |notice: &SessionNotice| {
        sink.lock().map_err(|e| e.to_string())?.push(notice.clone());
        Ok(())
    });
    seen
}

#[test]
#[allow(clippy::unwrap_used)]
fn login_send_switch_then_unread_in_previous_room() {
    let now = Instant::now();
    let mut session = session(5);
    let mut wire = Wire::default();

    let actions = session.login("alice", "general", now).unwrap();
    let first = wire.execute(&actions).unwrap();
    let actions = session.handle_transport_event(TransportEvent::Opened { transport: first }, now);
    assert!(actions.contains(&SessionAction::Settled(Ok(()))));
    assert!(actions.contains(&SessionAction::RefreshCatalog));

    assert!(session.send_message("hi", &mut wire));
    assert_eq!(wire.written, vec![(
        first,
        r#"{"type":"message","message":"hi","room_id":"general"}"#.to_string()
    )]);

    let actions = session.switch_room("random", now).unwrap();
    assert!(actions.iter().any(|action| matches!(
        action,
        SessionAction::Close { transport, code: CloseCode::NORMAL, .. } if *transport == first
    )));
    let second = wire.execute(&actions).unwrap();
    assert_eq!(wire.opened[1].1, "ws://chat.test/ws/alice?room_id=random");

    let actions =
        session.handle_transport_event(TransportEvent::Opened { transport: second }, now);
    assert!(actions.contains(&SessionAction::Settled(Ok(()))));

    let text = r#"{"username":"bob","message":"psst","timestamp":"t","message_type":"message","room_id":"general"}"#;
    session.handle_transport_event(
        TransportEvent::Frame { transport: second, text: text.to_string() },
        now,
    );

    let state = session.state().unwrap();
    assert_eq!(state.active_room(), "random");
    assert_eq!(state.unread("general"), 1);
    assert_eq!(state.unread("random"), 0);
}

#[test]
#[allow(clippy::unwrap_used)]
fn login_timeout_rejects_without_retry() {
    let now = Instant::now();
    let mut session = session(5);
    let timeout = session.connection().config().connect_timeout;

    let actions = session.login("alice", "general", now).unwrap();
    assert!(actions.iter().any(|action| matches!(action, SessionAction::Open { .. })));

    let actions = session.tick(now + timeout);
    assert!(actions.contains(&SessionAction::Settled(Err(SessionError::Connection(
        ConnectionError::ConnectTimeout { elapsed: timeout }
    )))));
    assert!(!session.is_logged_in());
    assert_eq!(session.connection_state(), ConnectionState::Idle);
    assert_eq!(session.connection().retry_count(), 0);
    assert_eq!(session.next_deadline(), None);
}

#[test]
fn invalid_input_never_reaches_the_network() {
    let now = Instant::now();
    let mut session = session(5);
    let mut wire = Wire::default();

    assert_eq!(
        session.login("   ", "general", now),
        Err(SessionError::Validation(ValidationError::EmptyIdentity))
    );
    // Padding counts toward the bound.
    assert_eq!(
        session.login("  alice-in-wonderland ", "general", now),
        Err(SessionError::Validation(ValidationError::IdentityTooLong { max: 20 }))
    );
    assert!(!session.send_message("hello", &mut wire));
    assert!(wire.written.is_empty());
    assert_eq!(session.connection_state(), ConnectionState::Idle);
}

#[test]
#[allow(clippy::unwrap_used)]
fn retry_exhaustion_surfaces_a_notice() {
    let now = Instant::now();
    let mut session = session(1);
    let seen = notices(&mut session);
    let mut wire = Wire::default();
    let delay = session.connection().config().retry_delay;

    let actions = session.login("alice", "general", now).unwrap();
    let transport = wire.execute(&actions).unwrap();
    session.handle_transport_event(TransportEvent::Opened { transport }, now);

    session.handle_transport_event(
        TransportEvent::Closed { transport, code: CloseCode::ABNORMAL },
        now,
    );
    assert_eq!(session.status(), "Reconnecting... (1/1)");

    let actions = session.tick(now + delay);
    let retry = wire.execute(&actions).unwrap();
    session.handle_transport_event(
        TransportEvent::Closed { transport: retry, code: CloseCode::ABNORMAL },
        now + delay,
    );

    let seen = seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(last.level, NoticeLevel::Error);
    assert_eq!(last.title, "Connection lost");
    assert!(last.description.contains("restart the session"));
    assert_eq!(session.next_deadline(), None);
}

#[test]
#[allow(clippy::unwrap_used)]
fn logout_then_login_starts_fresh() {
    let now = Instant::now();
    let mut session = session(5);
    let mut wire = Wire::default();

    let actions = session.login("alice", "general", now).unwrap();
    let transport = wire.execute(&actions).unwrap();
    session.handle_transport_event(TransportEvent::Opened { transport }, now);
    let text = r#"{"username":"bob","message":"x","timestamp":"t","message_type":"message","room_id":"random"}"#;
    session.handle_transport_event(TransportEvent::Frame { transport, text: text.to_string() }, now);
    assert_eq!(session.total_unread(), 1);

    session.logout();
    assert!(session.logout().is_empty());

    let actions = session.login("bob", "", now).unwrap();
    let transport = wire.execute(&actions).unwrap();
    session.handle_transport_event(TransportEvent::Opened { transport }, now);

    assert_eq!(session.identity(), Some("bob"));
    assert_eq!(session.total_unread(), 0);
    assert!(session.state().unwrap().history("random").is_none());
}
