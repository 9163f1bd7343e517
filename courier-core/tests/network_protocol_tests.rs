//! Tests for network::protocol
//! Engine.IO / Socket.IO text framing.

use courier_core::network::*;
use serde_json::{json, Value};

#[test]
fn test_decode_open_frame() {
    let frame = decode_frame(
        r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
    )
    .unwrap();

    match frame {
        Frame::Open(open) => {
            assert_eq!(open.sid, "lv_VI97HAXpY6yYWAAAC");
            assert_eq!(open.liveness_window_ms(), 45_000);
        }
        other => panic!("Expected open frame, got {:?}", other),
    }
}

#[test]
fn test_decode_ping_and_noop() {
    assert_eq!(decode_frame("2").unwrap(), Frame::Ping);
    assert_eq!(decode_frame("6").unwrap(), Frame::Noop);
    assert_eq!(decode_frame("5").unwrap(), Frame::Noop);
}

#[test]
fn test_encode_pong() {
    assert_eq!(encode_frame(&Frame::Pong).unwrap(), "3");
}

#[test]
fn test_decode_event_frame() {
    let frame = decode_frame(r#"42["new_message",{"conversationId":"c1","content":"hi"}]"#).unwrap();

    assert_eq!(
        frame,
        Frame::Message(Packet::event(
            "new_message",
            json!({ "conversationId": "c1", "content": "hi" })
        ))
    );
}

#[test]
fn test_decode_event_without_payload() {
    let packet = decode_packet(r#"2["call_ended"]"#).unwrap();
    assert_eq!(packet, Packet::event("call_ended", Value::Null));
}

#[test]
fn test_decode_event_skips_namespace_and_ack_id() {
    let packet = decode_packet(r#"2/chat,17["call_declined",{}]"#).unwrap();
    assert_eq!(packet, Packet::event("call_declined", json!({})));
}

#[test]
fn test_decode_event_ignores_extra_arguments() {
    let packet = decode_packet(r#"2["answer_made",{"answer":1},"extra"]"#).unwrap();
    assert_eq!(packet, Packet::event("answer_made", json!({ "answer": 1 })));
}

#[test]
fn test_encode_event_packet() {
    let text = encode_frame(&Frame::Message(Packet::event(
        "join_conversation",
        json!({ "conversationId": "c1" }),
    )))
    .unwrap();

    assert_eq!(text, r#"42["join_conversation",{"conversationId":"c1"}]"#);
}

#[test]
fn test_encode_event_with_null_payload() {
    let text = encode_packet(&Packet::event("call_ended", Value::Null)).unwrap();
    assert_eq!(text, r#"2["call_ended"]"#);
}

#[test]
fn test_encode_connect_with_token() {
    let text = encode_frame(&Frame::Message(Packet::connect_with_token("abc"))).unwrap();
    assert_eq!(text, r#"40{"token":"abc"}"#);
}

#[test]
fn test_decode_connect_ack() {
    let packet = decode_packet(r#"0{"sid":"wZX3oN0bSVIhsaknAAAI"}"#).unwrap();
    assert!(matches!(packet, Packet::Connect { auth: Some(_) }));
}

#[test]
fn test_decode_connect_error() {
    let packet = decode_packet(r#"4{"message":"invalid token"}"#).unwrap();
    assert_eq!(
        packet,
        Packet::ConnectError {
            data: json!({ "message": "invalid token" })
        }
    );
}

#[test]
fn test_decode_disconnect() {
    assert_eq!(decode_packet("1").unwrap(), Packet::Disconnect);
    assert_eq!(decode_frame("41").unwrap(), Frame::Message(Packet::Disconnect));
}

#[test]
fn test_malformed_frames_are_errors() {
    assert!(matches!(decode_frame(""), Err(NetworkError::InvalidMessage(_))));
    assert!(matches!(decode_frame("9"), Err(NetworkError::InvalidMessage(_))));
    assert!(matches!(decode_frame("0{not json"), Err(NetworkError::InvalidMessage(_))));
    assert!(matches!(decode_frame("42{}"), Err(NetworkError::InvalidMessage(_))));
    assert!(matches!(decode_frame("42[]"), Err(NetworkError::InvalidMessage(_))));
    assert!(matches!(decode_frame("42[1,2]"), Err(NetworkError::InvalidMessage(_))));
}

#[test]
fn test_ack_and_binary_packets_are_rejected() {
    assert!(decode_packet(r#"3["x"]"#).is_err());
    assert!(decode_packet(r#"51-["x",{"_placeholder":true,"num":0}]"#).is_err());
}
