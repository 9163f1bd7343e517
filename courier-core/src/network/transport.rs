// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport Trait
//!
//! Platform-agnostic abstraction for the socket carrying chat and signaling.

use std::time::Duration;

use super::error::NetworkError;
use super::protocol::Packet;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, NetworkError>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected to any server.
    #[default]
    Disconnected,
    /// Connection or reconnection in progress.
    Connecting,
    /// Connected, authenticated and ready.
    Connected,
}

impl ConnectionState {
    /// Returns true if the channel is open.
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Wire transport the handshake forces.
///
/// Only the websocket transport is spoken; long-polling is never negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Plain websocket from the first request, no polling upgrade.
    #[default]
    WebSocket,
}

impl TransportKind {
    /// Value of the `transport` query parameter.
    pub fn as_query_value(self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
        }
    }
}

/// Configuration for a single connection attempt.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Fully built handshake URL (ws:// or wss://).
    pub server_url: String,
    /// Bearer token sent in the connect packet.
    pub auth_token: String,
    /// Connection and handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds; bounds how long `receive` waits.
    pub io_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            server_url: String::new(),
            auth_token: String::new(),
            connect_timeout_ms: 10_000,
            io_timeout_ms: 50,
        }
    }
}

impl TransportConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout as a `Duration`.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms.max(1))
    }
}

/// Transport trait for the real-time socket.
///
/// Abstracts the underlying mechanism (websocket, in-memory mock) so the
/// connection manager and everything above it can be tested without a
/// server.
///
/// # Synchronous Interface
///
/// The receive loop owns the transport on its own thread, so the methods
/// block. `receive` must return within roughly `io_timeout_ms` so that the
/// loop can interleave outbound writes and notice shutdown requests.
pub trait Transport: Send {
    /// Connects and completes the authentication handshake.
    ///
    /// Returns `Ok(())` only once the server has accepted the token.
    fn connect(&mut self, config: &TransportConfig) -> TransportResult<()>;

    /// Closes the connection.
    ///
    /// Safe to call even if not connected.
    fn disconnect(&mut self) -> TransportResult<()>;

    /// Returns the current connection state.
    fn state(&self) -> ConnectionState;

    /// Writes one packet to the socket.
    ///
    /// Returns an error if not connected.
    fn send(&mut self, packet: &Packet) -> TransportResult<()>;

    /// Receives the next application packet.
    ///
    /// Returns `Ok(None)` when nothing arrived within the read timeout.
    /// Keep-alive traffic is handled internally and never surfaces here.
    fn receive(&mut self) -> TransportResult<Option<Packet>>;
}
