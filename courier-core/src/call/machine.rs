// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Call State Machine
//!
//! Pure transition logic for the single call slot. Every trigger returns
//! the [`Effects`] it produced; sending them is left to the caller.
//!
//! | State                         | Trigger                | Next      |
//! |-------------------------------|------------------------|-----------|
//! | Idle                          | `start_call`           | Outgoing  |
//! | Idle                          | `call_made`            | Incoming  |
//! | Outgoing                      | `answer_made`          | Connected |
//! | Incoming                      | `accept_call`          | Connected |
//! | Incoming                      | `decline_call`         | Idle      |
//! | Outgoing/Incoming/Connected   | `ice_candidate_received` | unchanged |
//! | Outgoing/Incoming/Connected   | end / decline          | Idle      |
//! | any                           | connection lost        | Idle      |

use std::collections::VecDeque;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::CallError;
use super::session::{CallEvent, CallSession, CallState, EndReason};
use crate::network::{OutboundEvent, PeerRef};

/// Candidates kept per peer while no session exists.
pub const ORPHAN_ICE_PER_PEER: usize = 32;

/// Peers tracked in the orphan candidate buffer.
pub const ORPHAN_ICE_PEERS: usize = 8;

/// What a transition produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    /// Event to send to the server.
    pub outbound: Option<OutboundEvent>,
    /// Notification for the UI.
    pub notify: Option<CallEvent>,
}

impl Effects {
    fn none() -> Self {
        Effects::default()
    }

    fn notify(event: CallEvent) -> Self {
        Effects {
            outbound: None,
            notify: Some(event),
        }
    }

    fn both(outbound: OutboundEvent, event: CallEvent) -> Self {
        Effects {
            outbound: Some(outbound),
            notify: Some(event),
        }
    }

    /// Returns true if the trigger was ignored.
    pub fn is_empty(&self) -> bool {
        self.outbound.is_none() && self.notify.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallMadePayload {
    #[serde(default)]
    conversation_id: Option<String>,
    offer: Value,
    #[serde(default)]
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnswerMadePayload {
    answer: Value,
    #[serde(default)]
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IceCandidatePayload {
    candidate: Value,
    #[serde(default)]
    from: Option<String>,
}

/// The call slot: at most one [`CallSession`] plus candidates that arrived
/// before any session existed.
#[derive(Debug, Default)]
pub struct CallMachine {
    session: Option<CallSession>,
    orphan_ice: VecDeque<(String, Vec<Value>)>,
}

impl CallMachine {
    /// Creates an idle machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> CallState {
        self.session
            .as_ref()
            .map_or(CallState::Idle, CallSession::state)
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    /// Number of candidates held for peers without a session.
    pub fn orphan_candidate_count(&self) -> usize {
        self.orphan_ice.iter().map(|(_, list)| list.len()).sum()
    }

    // === Local triggers ===

    /// Places a call to `peer`.
    pub fn start_call(&mut self, peer: PeerRef, offer: Value) -> Result<Effects, CallError> {
        if let Some(active) = &self.session {
            warn!(
                session = %active.id,
                state = ?active.state,
                %peer,
                "start_call rejected, a call is already active"
            );
            return Err(CallError::AlreadyActive(active.state));
        }

        let mut session = CallSession::outgoing(peer, offer.clone());
        if let Some(remote) = session.remote_socket.clone() {
            session.pending_ice_candidates = self.take_orphans(&remote);
        }
        info!(session = %session.id, peer = %session.peer, "calling");
        let outbound = OutboundEvent::CallUser {
            peer: session.peer.clone(),
            offer,
        };
        self.session = Some(session);

        Ok(Effects {
            outbound: Some(outbound),
            notify: None,
        })
    }

    /// Accepts the incoming call with `answer`.
    pub fn accept_call(&mut self, answer: Value) -> Result<Effects, CallError> {
        let session = self.require(CallState::Incoming)?;
        session.answer = Some(answer.clone());
        session.state = CallState::Connected;
        info!(session = %session.id, "call accepted");

        let outbound = OutboundEvent::MakeAnswer {
            to: session.signaling_target(),
            answer,
        };
        Ok(Effects::both(outbound, CallEvent::Accepted))
    }

    /// Declines the incoming call.
    pub fn decline_call(&mut self) -> Result<Effects, CallError> {
        let peer = self.require(CallState::Incoming)?.peer.clone();
        self.destroy(EndReason::Declined);
        Ok(Effects::both(
            OutboundEvent::DeclineCall { peer },
            CallEvent::Ended {
                reason: EndReason::Declined,
            },
        ))
    }

    /// Hangs up the active call, whatever its state.
    pub fn end_call(&mut self) -> Result<Effects, CallError> {
        let peer = match &self.session {
            Some(session) => session.peer.clone(),
            None => return Err(CallError::NoActiveCall),
        };
        self.destroy(EndReason::LocalHangup);
        Ok(Effects::both(
            OutboundEvent::EndCall { peer },
            CallEvent::Ended {
                reason: EndReason::LocalHangup,
            },
        ))
    }

    /// Relays a local ICE candidate to the peer.
    pub fn send_ice_candidate(&mut self, candidate: Value) -> Result<Effects, CallError> {
        let session = self.session.as_ref().ok_or(CallError::NoActiveCall)?;
        Ok(Effects {
            outbound: Some(OutboundEvent::IceCandidate {
                to: session.signaling_target(),
                candidate,
            }),
            notify: None,
        })
    }

    /// Drains the session's pending remote candidates.
    pub fn take_ice_candidates(&mut self) -> Vec<Value> {
        self.session
            .as_mut()
            .map(|session| std::mem::take(&mut session.pending_ice_candidates))
            .unwrap_or_default()
    }

    // === Remote triggers ===

    /// Handles `call_made`.
    pub fn on_call_made(&mut self, payload: &Value) -> Effects {
        let payload = match CallMadePayload::deserialize(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "dropping undecodable call_made");
                return Effects::none();
            }
        };
        if let Some(active) = &self.session {
            warn!(
                session = %active.id,
                state = ?active.state,
                from = ?payload.from,
                "call_made ignored, a call is already active"
            );
            return Effects::none();
        }

        let peer = match (payload.conversation_id, payload.from.clone()) {
            (Some(conversation_id), _) => PeerRef::Conversation(conversation_id),
            (None, Some(from)) => PeerRef::RemoteSocket(from),
            (None, None) => {
                warn!("call_made without conversationId or from, dropped");
                return Effects::none();
            }
        };

        let mut session = CallSession::incoming(peer, payload.from, payload.offer);
        if let Some(remote) = session.remote_socket.clone() {
            session.pending_ice_candidates = self.take_orphans(&remote);
        }
        info!(
            session = %session.id,
            peer = %session.peer,
            buffered_candidates = session.pending_ice_candidates.len(),
            "incoming call"
        );
        self.session = Some(session.clone());
        Effects::notify(CallEvent::Incoming { session })
    }

    /// Handles `answer_made`.
    pub fn on_answer_made(&mut self, payload: &Value) -> Effects {
        let payload = match AnswerMadePayload::deserialize(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "dropping undecodable answer_made");
                return Effects::none();
            }
        };
        let session = match self.session.as_mut() {
            Some(session) if session.state == CallState::Outgoing => session,
            other => {
                warn!(
                    state = ?other.map(|s| s.state),
                    "answer_made without an outgoing call, ignored"
                );
                return Effects::none();
            }
        };

        if let Some(from) = payload.from {
            session.remote_socket = Some(from);
        }
        session.answer = Some(payload.answer.clone());
        session.state = CallState::Connected;
        info!(session = %session.id, "call answered");
        Effects::notify(CallEvent::Answered {
            answer: payload.answer,
        })
    }

    /// Handles `ice_candidate_received`.
    pub fn on_ice_candidate(&mut self, payload: &Value) -> Effects {
        let payload = match IceCandidatePayload::deserialize(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "dropping undecodable ice_candidate_received");
                return Effects::none();
            }
        };

        if self.session.is_none() {
            match payload.from {
                Some(from) => self.buffer_orphan(from, payload.candidate),
                None => debug!("candidate without sender and no active call, dropped"),
            }
            return Effects::none();
        }
        let Some(session) = self.session.as_mut() else {
            return Effects::none();
        };

        if let (Some(from), Some(remote)) = (&payload.from, &session.remote_socket) {
            if from != remote {
                warn!(session = %session.id, %from, "candidate from another peer, ignored");
                return Effects::none();
            }
        }
        session.pending_ice_candidates.push(payload.candidate.clone());
        debug!(
            session = %session.id,
            pending = session.pending_ice_candidates.len(),
            "remote candidate added"
        );
        Effects::notify(CallEvent::IceCandidate {
            candidate: payload.candidate,
        })
    }

    /// Handles `call_ended`.
    pub fn on_call_ended(&mut self) -> Effects {
        self.remote_end(EndReason::RemoteHangup)
    }

    /// Handles `call_declined`.
    pub fn on_call_declined(&mut self) -> Effects {
        self.remote_end(EndReason::RemoteDeclined)
    }

    /// Destroys the session without telling the peer, which is unreachable.
    pub fn on_connection_lost(&mut self) -> Effects {
        self.orphan_ice.clear();
        if self.session.is_none() {
            return Effects::none();
        }
        self.destroy(EndReason::ConnectionLost);
        Effects::notify(CallEvent::Ended {
            reason: EndReason::ConnectionLost,
        })
    }

    // === Internals ===

    fn require(&mut self, expected: CallState) -> Result<&mut CallSession, CallError> {
        match self.session.as_mut() {
            Some(session) if session.state == expected => Ok(session),
            Some(session) => {
                warn!(session = %session.id, state = ?session.state, ?expected, "call operation rejected");
                Err(CallError::InvalidState {
                    expected,
                    actual: session.state,
                })
            }
            None => Err(CallError::NoActiveCall),
        }
    }

    fn remote_end(&mut self, reason: EndReason) -> Effects {
        if self.session.is_none() {
            debug!(?reason, "remote end without an active call, ignored");
            return Effects::none();
        }
        self.destroy(reason);
        Effects::notify(CallEvent::Ended { reason })
    }

    fn destroy(&mut self, reason: EndReason) {
        if let Some(session) = self.session.take() {
            info!(session = %session.id, ?reason, "call ended");
        }
    }

    fn buffer_orphan(&mut self, from: String, candidate: Value) {
        if let Some((_, list)) = self.orphan_ice.iter_mut().find(|(peer, _)| *peer == from) {
            if list.len() >= ORPHAN_ICE_PER_PEER {
                debug!(%from, "orphan candidate buffer full, dropped");
                return;
            }
            list.push(candidate);
            return;
        }

        if self.orphan_ice.len() >= ORPHAN_ICE_PEERS {
            if let Some((evicted, _)) = self.orphan_ice.pop_front() {
                debug!(%evicted, "evicting oldest orphan candidates");
            }
        }
        debug!(%from, "buffering candidate until a call exists");
        self.orphan_ice.push_back((from, vec![candidate]));
    }

    fn take_orphans(&mut self, peer: &str) -> Vec<Value> {
        match self.orphan_ice.iter().position(|(id, _)| id == peer) {
            Some(pos) => self
                .orphan_ice
                .remove(pos)
                .map(|(_, list)| list)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }
}
