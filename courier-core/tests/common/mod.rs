// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared helpers, fixtures, and utilities used across test modules.

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use courier_core::network::{ConnectionConfig, ConnectionManager, MockTransport, ReconnectPolicy};
use courier_core::{ConnectionState, EventDispatcher};
use tracing_subscriber::EnvFilter;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(3);

/// Installs a log subscriber honouring `RUST_LOG`. Safe to call from every
/// test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or `WAIT` elapses.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Connection settings with short timeouts and reconnect delays.
pub fn fast_config() -> ConnectionConfig {
    ConnectionConfig::new("https://api.example.com")
        .with_io_timeout(Duration::from_millis(5))
        .with_reconnect(
            ReconnectPolicy::default()
                .with_delays(Duration::from_millis(10), Duration::from_millis(20)),
        )
}

/// A manager over a fresh mock transport. The returned transport shares
/// state with the one the manager drives.
pub fn mock_connection(
    config: ConnectionConfig,
) -> (
    Arc<ConnectionManager<MockTransport>>,
    MockTransport,
    Arc<EventDispatcher>,
) {
    init_tracing();
    let transport = MockTransport::new();
    let events = Arc::new(EventDispatcher::new());
    let manager = Arc::new(ConnectionManager::new(
        transport.clone(),
        config,
        Arc::clone(&events),
    ));
    (manager, transport, events)
}

/// Connects `manager` and waits for `Connected`.
pub fn connect(manager: &ConnectionManager<MockTransport>) {
    manager.connect("abc");
    assert!(
        wait_until(|| manager.state() == ConnectionState::Connected),
        "connection did not come up"
    );
}

/// Emitter that records what it is asked to send while "connected".
#[derive(Default)]
pub struct RecordingEmitter {
    state: parking_lot::Mutex<ConnectionState>,
    sent: parking_lot::Mutex<Vec<courier_core::OutboundEvent>>,
}

impl RecordingEmitter {
    /// A recorder that starts out connected.
    pub fn connected() -> Arc<Self> {
        let emitter = RecordingEmitter::default();
        *emitter.state.lock() = ConnectionState::Connected;
        Arc::new(emitter)
    }

    /// A recorder that starts out disconnected.
    pub fn disconnected() -> Arc<Self> {
        Arc::new(RecordingEmitter::default())
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    pub fn sent(&self) -> Vec<courier_core::OutboundEvent> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Conversation ids of recorded `join_conversation` events.
    pub fn joins(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|event| match event {
                courier_core::OutboundEvent::JoinConversation { conversation_id } => {
                    Some(conversation_id.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl courier_core::Emitter for RecordingEmitter {
    fn emit(&self, event: courier_core::OutboundEvent) {
        if self.state.lock().is_connected() {
            self.sent.lock().push(event);
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }
}
