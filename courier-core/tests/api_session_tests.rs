//! Tests for api::session
//! End-to-end flows through the session context.

mod common;

use std::time::Duration;

use common::{init_tracing, wait_until, WAIT};
use courier_core::api::*;
use courier_core::network::{names, ConnectionState, MockTransport, ReconnectPolicy};
use courier_core::{CallState, MessageKind, PeerRef};
use serde_json::json;

fn session() -> (RealtimeSession<MockTransport>, MockTransport) {
    init_tracing();
    let transport = MockTransport::new();
    let config = SessionConfig::new("https://api.example.com")
        .with_io_timeout(Duration::from_millis(5))
        .with_reconnect(
            ReconnectPolicy::default()
                .with_delays(Duration::from_millis(10), Duration::from_millis(20)),
        );
    let session = RealtimeSessionBuilder::new()
        .config(config)
        .transport(transport.clone())
        .build();
    (session, transport)
}

fn connect(session: &RealtimeSession<MockTransport>) {
    session.connect("abc").unwrap();
    assert!(wait_until(|| session.state() == ConnectionState::Connected));
}

#[test]
fn test_session_starts_disconnected() {
    let (session, transport) = session();

    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.call().state(), CallState::Idle);
    assert!(session.rooms().is_empty());
    assert_eq!(transport.connect_count(), 0);
}

#[test]
fn test_connection_state_stream() {
    let (session, _transport) = session();
    let states = session.subscribe_connection_state();

    connect(&session);
    assert_eq!(states.next_timeout(WAIT), Some(ConnectionState::Connecting));
    assert_eq!(states.next_timeout(WAIT), Some(ConnectionState::Connected));

    session.disconnect();

    assert_eq!(states.next_timeout(WAIT), Some(ConnectionState::Disconnected));
}

#[test]
fn test_chat_round_trip_through_server_echo() {
    let (session, transport) = session();
    let messages = session.messages();
    connect(&session);
    session.join_room("c1");

    session.send_message("c1", "hi", MessageKind::Text);
    assert!(wait_until(|| transport.sent_named(names::SEND_MESSAGE).len() == 1));
    transport.queue_event(
        names::NEW_MESSAGE,
        json!({
            "conversationId": "c1",
            "senderId": "me",
            "content": "hi",
            "type": "text",
            "createdAt": "2026-03-01T12:00:00.000Z",
        }),
    );

    let echoed = messages.next_timeout(WAIT).unwrap();
    assert_eq!(echoed.content, "hi");
    assert_eq!(session.rooms(), vec!["c1".to_string()]);
    assert_eq!(transport.sent_named(names::JOIN_CONVERSATION).len(), 1);
}

#[test]
fn test_call_through_session() {
    let (session, transport) = session();
    connect(&session);

    session
        .call()
        .start_call(PeerRef::Conversation("c1".into()), json!({ "sdp": "X" }))
        .unwrap();
    transport.queue_event(names::ANSWER_MADE, json!({ "answer": { "sdp": "Y" }, "from": "s2" }));

    let call = session.call().wait_connected(WAIT).unwrap();
    assert_eq!(call.answer(), Some(&json!({ "sdp": "Y" })));
    assert_eq!(
        transport.sent_named(names::CALL_USER),
        vec![json!({ "conversationId": "c1", "offer": { "sdp": "X" } })]
    );
}

#[test]
fn test_shutdown_is_final() {
    let (session, _transport) = session();
    connect(&session);

    session.shutdown();
    session.shutdown();

    assert!(session.is_shut_down());
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.dispatcher().subscriber_count(), 0);
    assert_eq!(session.connect("abc"), Err(CourierError::ShutDown));
}

#[test]
fn test_bad_endpoint_is_logged_not_returned() {
    init_tracing();
    let session = RealtimeSession::new(MockTransport::new(), SessionConfig::new("::nope::"));

    assert_eq!(session.connect("abc"), Ok(()));
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[test]
fn test_config_conversion() {
    let config = SessionConfig::new("https://api.example.com").with_path("/rt/");
    let connection = config.to_connection_config();

    assert_eq!(connection.endpoint, "https://api.example.com");
    assert_eq!(connection.path, "/rt/");
    assert_eq!(connection.reconnect, ReconnectPolicy::default());
}

#[test]
fn test_error_conversions() {
    let err: CourierError = courier_core::CallError::NoActiveCall.into();
    assert!(err.to_string().contains("no active call"));

    let err: CourierError = courier_core::NetworkError::NotConnected.into();
    assert!(matches!(err, CourierError::Network(_)));
}
