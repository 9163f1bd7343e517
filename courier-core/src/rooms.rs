// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Room Membership Tracker
//!
//! Remembers every conversation room joined during the session and replays
//! the joins on each `Connected` transition, so membership survives
//! reconnects.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::events::{EventCategory, EventDispatcher, EventHandler, SessionEvent, Subscription};
use crate::network::{ConnectionState, Emitter, OutboundEvent};

/// Insertion-ordered set of conversation ids.
#[derive(Debug, Clone, Default)]
pub struct RoomSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl RoomSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conversation_id`; returns false if it was already present.
    pub fn insert(&mut self, conversation_id: &str) -> bool {
        if !self.members.insert(conversation_id.to_string()) {
            return false;
        }
        self.order.push(conversation_id.to_string());
        true
    }

    /// Returns true if the room was joined.
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.members.contains(conversation_id)
    }

    /// Rooms in the order they were first joined.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no room was joined.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Join requests for every room, in insertion order.
    pub fn join_events(&self) -> Vec<OutboundEvent> {
        self.iter().map(join_event).collect()
    }
}

fn join_event(conversation_id: &str) -> OutboundEvent {
    OutboundEvent::JoinConversation {
        conversation_id: conversation_id.to_string(),
    }
}

struct TrackerState {
    rooms: RoomSet,
    /// Connection state as last seen through the dispatcher.
    observed: ConnectionState,
}

struct TrackerInner {
    emitter: Arc<dyn Emitter>,
    state: Mutex<TrackerState>,
}

impl EventHandler for TrackerInner {
    fn on_event(&self, event: SessionEvent) {
        let SessionEvent::ConnectionStateChanged { state } = event else {
            return;
        };

        // Replaying under the lock keeps a concurrent join_room from
        // emitting the same room twice.
        let mut guard = self.state.lock();
        guard.observed = state;
        if state.is_connected() && !guard.rooms.is_empty() {
            info!(rooms = guard.rooms.len(), "replaying room joins");
            for event in guard.rooms.join_events() {
                self.emitter.emit(event);
            }
        }
    }
}

/// Tracks joined conversation rooms and keeps them joined across reconnects.
///
/// Rooms are join-only for the lifetime of the tracker.
pub struct RoomTracker {
    inner: Arc<TrackerInner>,
    _subscription: Subscription,
}

impl RoomTracker {
    /// Creates a tracker emitting through `emitter` and following
    /// connection state changes on `dispatcher`.
    pub fn new(emitter: Arc<dyn Emitter>, dispatcher: &EventDispatcher) -> Self {
        let observed = emitter.state();
        let inner = Arc::new(TrackerInner {
            emitter,
            state: Mutex::new(TrackerState {
                rooms: RoomSet::new(),
                observed,
            }),
        });
        let subscription = dispatcher.subscribe(EventCategory::Connection, &inner);

        RoomTracker {
            inner,
            _subscription: subscription,
        }
    }

    /// Joins a conversation room.
    ///
    /// Idempotent. The join request goes out right away when connected and
    /// otherwise on the next `Connected` transition.
    pub fn join_room(&self, conversation_id: &str) {
        let mut guard = self.inner.state.lock();
        if !guard.rooms.insert(conversation_id) {
            debug!(conversation_id, "room already joined");
            return;
        }
        if guard.observed.is_connected() {
            debug!(conversation_id, "joining room");
            self.inner.emitter.emit(join_event(conversation_id));
        } else {
            debug!(conversation_id, "not connected, join deferred");
        }
    }

    /// Joined rooms in insertion order.
    pub fn rooms(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .rooms
            .iter()
            .map(str::to_string)
            .collect()
    }

    /// Returns true if the room was joined.
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.inner.state.lock().rooms.contains(conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingEmitter {
        state: Mutex<ConnectionState>,
        sent: Mutex<Vec<OutboundEvent>>,
    }

    impl Emitter for RecordingEmitter {
        fn emit(&self, event: OutboundEvent) {
            if self.state.lock().is_connected() {
                self.sent.lock().push(event);
            }
        }

        fn state(&self) -> ConnectionState {
            *self.state.lock()
        }
    }

    #[test]
    fn test_room_set_keeps_first_insertion_order() {
        let mut set = RoomSet::new();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));

        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_replay_emits_every_room_in_order() {
        let emitter = Arc::new(RecordingEmitter::default());
        let inner = TrackerInner {
            emitter: emitter.clone(),
            state: Mutex::new(TrackerState {
                rooms: RoomSet::new(),
                observed: ConnectionState::Disconnected,
            }),
        };
        inner.state.lock().rooms.insert("c1");
        inner.state.lock().rooms.insert("c2");

        *emitter.state.lock() = ConnectionState::Connected;
        inner.on_event(SessionEvent::ConnectionStateChanged {
            state: ConnectionState::Connected,
        });

        assert_eq!(
            *emitter.sent.lock(),
            vec![join_event("c1"), join_event("c2")]
        );
        assert_eq!(inner.state.lock().observed, ConnectionState::Connected);
    }

    #[test]
    fn test_disconnect_event_does_not_replay() {
        let emitter = Arc::new(RecordingEmitter::default());
        *emitter.state.lock() = ConnectionState::Connected;
        let inner = TrackerInner {
            emitter: emitter.clone(),
            state: Mutex::new(TrackerState {
                rooms: RoomSet::new(),
                observed: ConnectionState::Connected,
            }),
        };
        inner.state.lock().rooms.insert("c1");

        inner.on_event(SessionEvent::ConnectionStateChanged {
            state: ConnectionState::Disconnected,
        });

        assert!(emitter.sent.lock().is_empty());
        assert_eq!(inner.state.lock().observed, ConnectionState::Disconnected);
    }
}
