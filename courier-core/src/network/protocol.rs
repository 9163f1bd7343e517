// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Protocol
//!
//! Text framing spoken by the platform's socket server: Engine.IO v4 frames
//! carrying Socket.IO v5 packets on the default namespace.
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   engine open
//! 2 / 3                                                    engine ping / pong
//! 40{"token":"abc"}                                        socket connect + auth
//! 42["new_message",{"conversationId":"c1",...}]            socket event
//! ```
//!
//! Binary attachments are not supported. Ack ids on inbound events are
//! parsed and discarded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::NetworkError;

/// Engine.IO protocol revision sent in the handshake query.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Engine open packet payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine session id.
    pub sid: String,
    /// Server ping interval in milliseconds.
    pub ping_interval: u64,
    /// Grace period after a missed ping in milliseconds.
    pub ping_timeout: u64,
    /// Transports the server would upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
}

impl OpenHandshake {
    /// Silence window after which the connection counts as dead.
    pub fn liveness_window_ms(&self) -> u64 {
        self.ping_interval.saturating_add(self.ping_timeout)
    }
}

/// A Socket.IO packet on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Namespace connect; carries the auth object when sent by the client.
    Connect {
        /// Auth payload (client) or `{sid}` (server ack).
        auth: Option<Value>,
    },
    /// Namespace disconnect.
    Disconnect,
    /// Named event with a single JSON payload.
    Event {
        /// Event name.
        name: String,
        /// Event payload; `Null` when the event carried no argument.
        data: Value,
    },
    /// The server refused the namespace connect.
    ConnectError {
        /// Error payload, usually `{"message": ".."}`.
        data: Value,
    },
}

impl Packet {
    /// Creates an event packet.
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Packet::Event {
            name: name.into(),
            data,
        }
    }

    /// Creates the client connect packet carrying the bearer token.
    pub fn connect_with_token(token: &str) -> Self {
        Packet::Connect {
            auth: Some(serde_json::json!({ "token": token })),
        }
    }
}

/// An Engine.IO frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Session open (server to client).
    Open(OpenHandshake),
    /// Transport close.
    Close,
    /// Keep-alive ping.
    Ping,
    /// Keep-alive pong.
    Pong,
    /// Socket.IO payload.
    Message(Packet),
    /// Upgrade and noop frames; nothing to do.
    Noop,
}

/// Encodes an Engine.IO frame to its text form.
pub fn encode_frame(frame: &Frame) -> Result<String, NetworkError> {
    Ok(match frame {
        Frame::Open(open) => format!("0{}", to_json(open)?),
        Frame::Close => "1".to_string(),
        Frame::Ping => "2".to_string(),
        Frame::Pong => "3".to_string(),
        Frame::Message(packet) => format!("4{}", encode_packet(packet)?),
        Frame::Noop => "6".to_string(),
    })
}

/// Decodes one Engine.IO text frame.
pub fn decode_frame(text: &str) -> Result<Frame, NetworkError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| NetworkError::InvalidMessage("empty frame".into()))?;
    let body = chars.as_str();

    match kind {
        '0' => serde_json::from_str(body)
            .map(Frame::Open)
            .map_err(|e| NetworkError::InvalidMessage(format!("bad open packet: {}", e))),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_packet(body).map(Frame::Message),
        '5' | '6' => Ok(Frame::Noop),
        other => Err(NetworkError::InvalidMessage(format!(
            "unknown frame type '{}'",
            other
        ))),
    }
}

/// Encodes a Socket.IO packet (without the engine prefix).
pub fn encode_packet(packet: &Packet) -> Result<String, NetworkError> {
    Ok(match packet {
        Packet::Connect { auth: Some(auth) } => format!("0{}", to_json(auth)?),
        Packet::Connect { auth: None } => "0".to_string(),
        Packet::Disconnect => "1".to_string(),
        Packet::Event { name, data } => {
            let args = if data.is_null() {
                serde_json::json!([name])
            } else {
                serde_json::json!([name, data])
            };
            format!("2{}", to_json(&args)?)
        }
        Packet::ConnectError { data } => format!("4{}", to_json(data)?),
    })
}

/// Decodes a Socket.IO packet (without the engine prefix).
pub fn decode_packet(text: &str) -> Result<Packet, NetworkError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| NetworkError::InvalidMessage("empty packet".into()))?;
    let rest = skip_ack_id(skip_namespace(chars.as_str()));

    match kind {
        '0' => Ok(Packet::Connect {
            auth: parse_optional_json(rest)?,
        }),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(rest),
        '4' => Ok(Packet::ConnectError {
            data: parse_optional_json(rest)?.unwrap_or(Value::Null),
        }),
        '3' => Err(NetworkError::InvalidMessage("ack packets are not supported".into())),
        '5' | '6' => Err(NetworkError::InvalidMessage(
            "binary packets are not supported".into(),
        )),
        other => Err(NetworkError::InvalidMessage(format!(
            "unknown packet type '{}'",
            other
        ))),
    }
}

fn decode_event(body: &str) -> Result<Packet, NetworkError> {
    let args: Value = serde_json::from_str(body)
        .map_err(|e| NetworkError::InvalidMessage(format!("bad event body: {}", e)))?;
    let mut args = match args {
        Value::Array(args) => args.into_iter(),
        _ => return Err(NetworkError::InvalidMessage("event body is not an array".into())),
    };
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(NetworkError::InvalidMessage("event name missing".into())),
    };
    // Extra arguments are ignored; every event here carries one payload.
    let data = args.next().unwrap_or(Value::Null);
    Ok(Packet::Event { name, data })
}

/// Strips a `/namespace,` prefix if present.
fn skip_namespace(text: &str) -> &str {
    if text.starts_with('/') {
        match text.find(',') {
            Some(pos) => &text[pos + 1..],
            None => "",
        }
    } else {
        text
    }
}

fn skip_ack_id(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_optional_json(body: &str) -> Result<Option<Value>, NetworkError> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| NetworkError::InvalidMessage(format!("bad packet body: {}", e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, NetworkError> {
    serde_json::to_string(value).map_err(|e| NetworkError::InvalidMessage(e.to_string()))
}
