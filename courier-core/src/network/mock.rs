// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Transport
//!
//! In-memory transport for tests. Clones share state, so a test keeps one
//! handle to script the server side while the connection manager drives
//! the other.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde_json::Value;

use super::error::NetworkError;
use super::protocol::Packet;
use super::transport::{ConnectionState, Transport, TransportConfig, TransportResult};

#[derive(Debug)]
struct MockState {
    state: ConnectionState,
    incoming: VecDeque<Packet>,
    sent: Vec<Packet>,
    connect_errors: VecDeque<NetworkError>,
    receive_error: Option<NetworkError>,
    connect_count: u32,
    last_config: Option<TransportConfig>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            state: ConnectionState::Disconnected,
            incoming: VecDeque::new(),
            sent: Vec::new(),
            connect_errors: VecDeque::new(),
            receive_error: None,
            connect_count: 0,
            last_config: None,
        }
    }
}

/// Scriptable in-memory transport.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a disconnected mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a packet for `receive`.
    pub fn queue_receive(&self, packet: Packet) {
        self.inner.lock().incoming.push_back(packet);
    }

    /// Queues a named server event for `receive`.
    pub fn queue_event(&self, name: &str, payload: Value) {
        self.queue_receive(Packet::event(name, payload));
    }

    /// Makes the next `connect` fail with `error`. Errors queue up, one per
    /// attempt.
    pub fn inject_error(&self, error: NetworkError) {
        self.inner.lock().connect_errors.push_back(error);
    }

    /// Simulates a network drop: the next `receive` fails and the transport
    /// reports `Disconnected`.
    pub fn drop_connection(&self) {
        self.inner.lock().receive_error = Some(NetworkError::ConnectionClosed);
    }

    /// Simulates the server kicking this client.
    pub fn server_disconnect(&self) {
        self.inner.lock().receive_error = Some(NetworkError::ServerDisconnect);
    }

    /// Packets queued but not yet received.
    pub fn pending_receive(&self) -> usize {
        self.inner.lock().incoming.len()
    }

    /// Every packet written so far.
    pub fn sent_packets(&self) -> Vec<Packet> {
        self.inner.lock().sent.clone()
    }

    /// Written events as `(name, payload)` pairs.
    pub fn sent_events(&self) -> Vec<(String, Value)> {
        self.inner
            .lock()
            .sent
            .iter()
            .filter_map(|packet| match packet {
                Packet::Event { name, data } => Some((name.clone(), data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Written events with the given name.
    pub fn sent_named(&self, name: &str) -> Vec<Value> {
        self.sent_events()
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Forgets recorded writes.
    pub fn clear_sent(&self) {
        self.inner.lock().sent.clear();
    }

    /// Number of `connect` calls, failed ones included.
    pub fn connect_count(&self) -> u32 {
        self.inner.lock().connect_count
    }

    /// Config passed to the most recent `connect`.
    pub fn last_config(&self) -> Option<TransportConfig> {
        self.inner.lock().last_config.clone()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, config: &TransportConfig) -> TransportResult<()> {
        let mut inner = self.inner.lock();
        inner.connect_count += 1;
        inner.last_config = Some(config.clone());
        inner.receive_error = None;

        if let Some(error) = inner.connect_errors.pop_front() {
            inner.state = ConnectionState::Disconnected;
            return Err(error);
        }

        inner.state = ConnectionState::Connected;
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        self.inner.lock().state = ConnectionState::Disconnected;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn send(&mut self, packet: &Packet) -> TransportResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_connected() {
            return Err(NetworkError::NotConnected);
        }
        inner.sent.push(packet.clone());
        Ok(())
    }

    fn receive(&mut self) -> TransportResult<Option<Packet>> {
        let wait = {
            let mut inner = self.inner.lock();
            if let Some(error) = inner.receive_error.take() {
                inner.state = ConnectionState::Disconnected;
                return Err(error);
            }
            if !inner.state.is_connected() {
                return Err(NetworkError::NotConnected);
            }
            if let Some(packet) = inner.incoming.pop_front() {
                return Ok(Some(packet));
            }
            inner
                .last_config
                .as_ref()
                .map(TransportConfig::io_timeout)
                .unwrap_or_default()
        };

        // Behave like a socket read timeout.
        thread::sleep(wait);
        Ok(None)
    }
}
