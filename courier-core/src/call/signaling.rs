// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Call Signaling
//!
//! Connects the [`CallMachine`] to the socket: local operations emit
//! through the [`Emitter`], remote signaling and connection loss arrive
//! through the dispatcher, and every resulting [`CallEvent`] is fanned out
//! to the open [`EventStream`]s.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use tracing::debug;

use super::error::CallError;
use super::machine::{CallMachine, Effects};
use super::session::{CallEvent, CallSession, CallState};
use crate::events::{
    EventCategory, EventDispatcher, EventHandler, EventStream, SessionEvent, Subscription,
};
use crate::network::{ConnectionState, Emitter, InboundKind, PeerRef};

struct SignalingInner {
    emitter: Arc<dyn Emitter>,
    machine: Mutex<CallMachine>,
    changed: Condvar,
    listeners: Mutex<Vec<Sender<CallEvent>>>,
}

impl SignalingInner {
    /// Runs `f` against the machine and applies the effects it returns.
    ///
    /// Effects are applied while the machine is locked so emits and
    /// notifications follow the order of transitions.
    fn apply<R>(
        &self,
        f: impl FnOnce(&mut CallMachine) -> Result<(Effects, R), CallError>,
    ) -> Result<R, CallError> {
        let mut machine = self.machine.lock();
        let (effects, result) = f(&mut machine)?;
        if let Some(outbound) = effects.outbound {
            self.emitter.emit(outbound);
        }
        if let Some(event) = effects.notify {
            self.notify(event);
        }
        self.changed.notify_all();
        Ok(result)
    }

    fn apply_remote(&self, f: impl FnOnce(&mut CallMachine) -> Effects) {
        let _ = self.apply(|machine| Ok((f(machine), ())));
    }

    fn notify(&self, event: CallEvent) {
        self.listeners
            .lock()
            .retain(|listener| listener.send(event.clone()).is_ok());
    }
}

impl EventHandler for SignalingInner {
    fn on_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::ConnectionStateChanged {
                state: ConnectionState::Disconnected,
            } => self.apply_remote(CallMachine::on_connection_lost),
            SessionEvent::ConnectionStateChanged { .. } => {}
            SessionEvent::Inbound(inbound) => match inbound.kind() {
                InboundKind::CallMade => self.apply_remote(|m| m.on_call_made(&inbound.payload)),
                InboundKind::AnswerMade => {
                    self.apply_remote(|m| m.on_answer_made(&inbound.payload))
                }
                InboundKind::IceCandidateReceived => {
                    self.apply_remote(|m| m.on_ice_candidate(&inbound.payload))
                }
                InboundKind::CallEnded => self.apply_remote(CallMachine::on_call_ended),
                InboundKind::CallDeclined => self.apply_remote(CallMachine::on_call_declined),
                InboundKind::NewMessage | InboundKind::Unknown => {
                    debug!(event = %inbound.name, "not a call event, ignored");
                }
            },
        }
    }
}

/// The call signaling session.
///
/// Holds at most one [`CallSession`]. Local operations return a
/// [`CallError`] when the current state does not allow them; remote
/// signaling that does not fit the state is logged and ignored.
pub struct CallSignaling {
    inner: Arc<SignalingInner>,
    _subscription: Subscription,
}

impl CallSignaling {
    /// Creates an idle signaling session.
    pub fn new(emitter: Arc<dyn Emitter>, dispatcher: &EventDispatcher) -> Self {
        let inner = Arc::new(SignalingInner {
            emitter,
            machine: Mutex::new(CallMachine::new()),
            changed: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
        });
        // One queue for both categories: a connection loss must be handled
        // before any signaling that arrived after it.
        let subscription =
            dispatcher.subscribe_many(&[EventCategory::Connection, EventCategory::Call], &inner);

        CallSignaling {
            inner,
            _subscription: subscription,
        }
    }

    /// Places a call to `peer` with `offer`. Returns the new session id.
    pub fn start_call(&self, peer: PeerRef, offer: Value) -> Result<String, CallError> {
        self.inner.apply(|machine| {
            let effects = machine.start_call(peer, offer)?;
            let id = machine.session().map(|s| s.id().to_string()).unwrap_or_default();
            Ok((effects, id))
        })
    }

    /// Accepts the incoming call with `answer`.
    pub fn accept_call(&self, answer: Value) -> Result<(), CallError> {
        self.inner
            .apply(|machine| machine.accept_call(answer).map(|effects| (effects, ())))
    }

    /// Declines the incoming call.
    pub fn decline_call(&self) -> Result<(), CallError> {
        self.inner
            .apply(|machine| machine.decline_call().map(|effects| (effects, ())))
    }

    /// Hangs up the active call.
    pub fn end_call(&self) -> Result<(), CallError> {
        self.inner
            .apply(|machine| machine.end_call().map(|effects| (effects, ())))
    }

    /// Relays a local ICE candidate to the peer.
    pub fn send_ice_candidate(&self, candidate: Value) -> Result<(), CallError> {
        self.inner.apply(|machine| {
            machine
                .send_ice_candidate(candidate)
                .map(|effects| (effects, ()))
        })
    }

    /// Drains the pending remote ICE candidates of the active session.
    pub fn take_ice_candidates(&self) -> Vec<Value> {
        self.inner.machine.lock().take_ice_candidates()
    }

    /// Snapshot of the active session.
    pub fn session(&self) -> Option<CallSession> {
        self.inner.machine.lock().session().cloned()
    }

    /// Current call state.
    pub fn state(&self) -> CallState {
        self.inner.machine.lock().state()
    }

    /// Blocks until the active session is `Connected`.
    ///
    /// Fails with [`CallError::SessionEnded`] if the session is destroyed
    /// first and with [`CallError::Timeout`] once `timeout` elapses.
    pub fn wait_connected(&self, timeout: Duration) -> Result<CallSession, CallError> {
        let deadline = Instant::now() + timeout;
        let mut machine = self.inner.machine.lock();
        let id = match machine.session() {
            Some(session) => session.id().to_string(),
            None => return Err(CallError::NoActiveCall),
        };

        loop {
            match machine.session() {
                Some(session) if session.id() != id => return Err(CallError::SessionEnded),
                None => return Err(CallError::SessionEnded),
                Some(session) if session.state() == CallState::Connected => {
                    return Ok(session.clone())
                }
                Some(_) => {}
            }
            if Instant::now() >= deadline {
                return Err(CallError::Timeout);
            }
            self.inner.changed.wait_until(&mut machine, deadline);
        }
    }

    /// Opens a stream of call notifications from now on.
    pub fn events(&self) -> EventStream<CallEvent> {
        let (tx, rx) = mpsc::channel();
        self.inner.listeners.lock().push(tx);
        EventStream::from_receiver(rx)
    }
}
