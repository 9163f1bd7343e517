// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Call Session Types

use serde_json::Value;
use uuid::Uuid;

use crate::network::PeerRef;

/// Signaling state of the call slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    /// No call.
    #[default]
    Idle,
    /// Offer sent, waiting for the answer.
    Outgoing,
    /// Offer received, waiting for the local user.
    Incoming,
    /// Offer and answer exchanged.
    Connected,
}

impl CallState {
    /// Returns true for every state except `Idle`.
    pub fn is_active(self) -> bool {
        self != CallState::Idle
    }
}

/// Who placed the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDirection {
    /// Placed locally.
    Outgoing,
    /// Placed by the remote peer.
    Incoming,
}

/// Why a call session was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Local `end_call`.
    LocalHangup,
    /// The peer sent `call_ended`.
    RemoteHangup,
    /// Local `decline_call`.
    Declined,
    /// The peer sent `call_declined`.
    RemoteDeclined,
    /// The socket dropped.
    ConnectionLost,
}

/// The single active call.
///
/// Offer, answer and candidates are opaque to this crate and relayed as-is
/// to the media layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    pub(crate) id: String,
    pub(crate) direction: CallDirection,
    pub(crate) peer: PeerRef,
    pub(crate) remote_socket: Option<String>,
    pub(crate) offer: Option<Value>,
    pub(crate) answer: Option<Value>,
    pub(crate) pending_ice_candidates: Vec<Value>,
    pub(crate) state: CallState,
}

impl CallSession {
    pub(crate) fn outgoing(peer: PeerRef, offer: Value) -> Self {
        let remote_socket = match &peer {
            PeerRef::RemoteSocket(id) => Some(id.clone()),
            PeerRef::Conversation(_) => None,
        };
        CallSession {
            id: Uuid::new_v4().to_string(),
            direction: CallDirection::Outgoing,
            peer,
            remote_socket,
            offer: Some(offer),
            answer: None,
            pending_ice_candidates: Vec::new(),
            state: CallState::Outgoing,
        }
    }

    pub(crate) fn incoming(peer: PeerRef, remote_socket: Option<String>, offer: Value) -> Self {
        CallSession {
            id: Uuid::new_v4().to_string(),
            direction: CallDirection::Incoming,
            peer,
            remote_socket,
            offer: Some(offer),
            answer: None,
            pending_ice_candidates: Vec::new(),
            state: CallState::Incoming,
        }
    }

    /// Local session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Who placed the call.
    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    /// Peer used for `call_user`, `end_call` and `decline_call`.
    pub fn peer(&self) -> &PeerRef {
        &self.peer
    }

    /// The remote participant's socket id, once known.
    pub fn remote_socket(&self) -> Option<&str> {
        self.remote_socket.as_deref()
    }

    /// Peer used for `make_answer` and `ice_candidate`: the remote socket
    /// when known, the call peer otherwise.
    pub fn signaling_target(&self) -> PeerRef {
        match &self.remote_socket {
            Some(id) => PeerRef::RemoteSocket(id.clone()),
            None => self.peer.clone(),
        }
    }

    /// The offer sent or received.
    pub fn offer(&self) -> Option<&Value> {
        self.offer.as_ref()
    }

    /// The answer sent or received.
    pub fn answer(&self) -> Option<&Value> {
        self.answer.as_ref()
    }

    /// Remote ICE candidates not yet taken, in arrival order.
    pub fn pending_ice_candidates(&self) -> &[Value] {
        &self.pending_ice_candidates
    }

    /// Current state; never `Idle`.
    pub fn state(&self) -> CallState {
        self.state
    }
}

/// Call notifications for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// A remote offer created an incoming session.
    Incoming {
        /// The new session, offer included.
        session: CallSession,
    },
    /// The callee answered an outgoing call.
    Answered {
        /// The remote answer.
        answer: Value,
    },
    /// The local user accepted an incoming call.
    Accepted,
    /// A remote ICE candidate was added to the session.
    IceCandidate {
        /// The candidate.
        candidate: Value,
    },
    /// The session was destroyed.
    Ended {
        /// Why.
        reason: EndReason,
    },
}
