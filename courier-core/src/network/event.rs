// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Named Events
//!
//! The application events multiplexed over the socket: chat delivery and
//! call signaling share one channel and are told apart by name.

use std::fmt;

use serde_json::{json, Map, Value};

use super::protocol::Packet;

/// Wire names of every application event.
pub mod names {
    /// Client joins a conversation room.
    pub const JOIN_CONVERSATION: &str = "join_conversation";
    /// Client posts a chat message.
    pub const SEND_MESSAGE: &str = "send_message";
    /// Server delivers a chat message to room members.
    pub const NEW_MESSAGE: &str = "new_message";
    /// Caller sends an offer.
    pub const CALL_USER: &str = "call_user";
    /// Callee receives an offer.
    pub const CALL_MADE: &str = "call_made";
    /// Callee sends its answer.
    pub const MAKE_ANSWER: &str = "make_answer";
    /// Caller receives the answer.
    pub const ANSWER_MADE: &str = "answer_made";
    /// Local ICE candidate relayed to the peer.
    pub const ICE_CANDIDATE: &str = "ice_candidate";
    /// Remote ICE candidate.
    pub const ICE_CANDIDATE_RECEIVED: &str = "ice_candidate_received";
    /// Local hang-up.
    pub const END_CALL: &str = "end_call";
    /// Remote hang-up.
    pub const CALL_ENDED: &str = "call_ended";
    /// Local decline of an incoming call.
    pub const DECLINE_CALL: &str = "decline_call";
    /// Remote decline.
    pub const CALL_DECLINED: &str = "call_declined";
}

/// Who signaling is addressed to.
///
/// Some server paths key calls by conversation, others by the remote
/// socket id learned from `from` fields. Both are kept typed and resolved to
/// a payload field only when an event is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerRef {
    /// A conversation room id.
    Conversation(String),
    /// The socket id of the remote participant.
    RemoteSocket(String),
}

impl PeerRef {
    /// The raw identifier.
    pub fn id(&self) -> &str {
        match self {
            PeerRef::Conversation(id) | PeerRef::RemoteSocket(id) => id,
        }
    }

    /// Payload field used by conversation-keyed events (`call_user`,
    /// `end_call`, `decline_call`).
    fn room_field(&self) -> &'static str {
        match self {
            PeerRef::Conversation(_) => "conversationId",
            PeerRef::RemoteSocket(_) => "to",
        }
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRef::Conversation(id) => write!(f, "conversation:{}", id),
            PeerRef::RemoteSocket(id) => write!(f, "socket:{}", id),
        }
    }
}

/// An event the client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// `join_conversation {conversationId}`
    JoinConversation {
        /// Room to join.
        conversation_id: String,
    },
    /// `send_message {conversationId, content, type}`
    SendMessage {
        /// Target room.
        conversation_id: String,
        /// Message body.
        content: String,
        /// Message type tag, e.g. `text`.
        kind: String,
    },
    /// `call_user {conversationId, offer}`
    CallUser {
        /// Callee.
        peer: PeerRef,
        /// Opaque session description.
        offer: Value,
    },
    /// `make_answer {to, answer}`
    MakeAnswer {
        /// Caller.
        to: PeerRef,
        /// Opaque session description.
        answer: Value,
    },
    /// `ice_candidate {to, candidate}`
    IceCandidate {
        /// Remote participant.
        to: PeerRef,
        /// Opaque candidate.
        candidate: Value,
    },
    /// `end_call {conversationId}`
    EndCall {
        /// Call being ended.
        peer: PeerRef,
    },
    /// `decline_call {conversationId}`
    DeclineCall {
        /// Call being declined.
        peer: PeerRef,
    },
}

impl OutboundEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinConversation { .. } => names::JOIN_CONVERSATION,
            OutboundEvent::SendMessage { .. } => names::SEND_MESSAGE,
            OutboundEvent::CallUser { .. } => names::CALL_USER,
            OutboundEvent::MakeAnswer { .. } => names::MAKE_ANSWER,
            OutboundEvent::IceCandidate { .. } => names::ICE_CANDIDATE,
            OutboundEvent::EndCall { .. } => names::END_CALL,
            OutboundEvent::DeclineCall { .. } => names::DECLINE_CALL,
        }
    }

    /// JSON payload of the event.
    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::JoinConversation { conversation_id } => {
                json!({ "conversationId": conversation_id })
            }
            OutboundEvent::SendMessage {
                conversation_id,
                content,
                kind,
            } => json!({
                "conversationId": conversation_id,
                "content": content,
                "type": kind,
            }),
            OutboundEvent::CallUser { peer, offer } => {
                let mut payload = room_payload(peer);
                payload.insert("offer".into(), offer.clone());
                Value::Object(payload)
            }
            OutboundEvent::MakeAnswer { to, answer } => {
                json!({ "to": to.id(), "answer": answer })
            }
            OutboundEvent::IceCandidate { to, candidate } => {
                json!({ "to": to.id(), "candidate": candidate })
            }
            OutboundEvent::EndCall { peer } | OutboundEvent::DeclineCall { peer } => {
                Value::Object(room_payload(peer))
            }
        }
    }

    /// Builds the socket packet for this event.
    pub fn to_packet(&self) -> Packet {
        Packet::event(self.name(), self.payload())
    }
}

fn room_payload(peer: &PeerRef) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(peer.room_field().into(), Value::String(peer.id().to_string()));
    payload
}

/// Classification of an inbound event by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    /// `new_message`
    NewMessage,
    /// `call_made`
    CallMade,
    /// `answer_made`
    AnswerMade,
    /// `ice_candidate_received`
    IceCandidateReceived,
    /// `call_ended`
    CallEnded,
    /// `call_declined`
    CallDeclined,
    /// Anything else.
    Unknown,
}

/// A named event received from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Wire name.
    pub name: String,
    /// Raw JSON payload.
    pub payload: Value,
}

impl InboundEvent {
    /// Creates an inbound event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        InboundEvent {
            name: name.into(),
            payload,
        }
    }

    /// Classifies the event by name.
    pub fn kind(&self) -> InboundKind {
        match self.name.as_str() {
            names::NEW_MESSAGE => InboundKind::NewMessage,
            names::CALL_MADE => InboundKind::CallMade,
            names::ANSWER_MADE => InboundKind::AnswerMade,
            names::ICE_CANDIDATE_RECEIVED => InboundKind::IceCandidateReceived,
            names::CALL_ENDED => InboundKind::CallEnded,
            names::CALL_DECLINED => InboundKind::CallDeclined,
            _ => InboundKind::Unknown,
        }
    }
}
