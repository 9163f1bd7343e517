// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Manager
//!
//! Owns the single persistent socket: authentication handshake, automatic
//! reconnection, outbound writes and the receive loop that publishes inbound
//! events and state changes to the dispatcher.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use super::endpoint::{handshake_url, DEFAULT_SOCKET_PATH};
use super::error::NetworkError;
use super::event::{InboundEvent, OutboundEvent};
use super::protocol::Packet;
use super::reconnect::ReconnectPolicy;
use super::transport::{ConnectionState, Transport, TransportConfig, TransportKind};
use crate::events::{EventDispatcher, SessionEvent};

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Base endpoint URL (`https://`, `http://`, `wss://` or `ws://`).
    pub endpoint: String,
    /// Socket path on the endpoint.
    pub path: String,
    /// Forced wire transport.
    pub transport: TransportKind,
    /// Connect + handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout of the receive loop in milliseconds.
    pub io_timeout_ms: u64,
    /// Reconnection after unexpected drops.
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            endpoint: String::new(),
            path: DEFAULT_SOCKET_PATH.to_string(),
            transport: TransportKind::WebSocket,
            connect_timeout_ms: 10_000,
            io_timeout_ms: 50,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a config for `endpoint` with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        ConnectionConfig {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Sets the socket path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the reconnection policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Sets the receive loop's read timeout.
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout_ms = io_timeout.as_millis() as u64;
        self
    }

    fn transport_config(&self, token: &str) -> Result<TransportConfig, NetworkError> {
        Ok(TransportConfig {
            server_url: handshake_url(&self.endpoint, &self.path, token, self.transport)?,
            auth_token: token.to_string(),
            connect_timeout_ms: self.connect_timeout_ms,
            io_timeout_ms: self.io_timeout_ms,
        })
    }
}

/// Outbound seam used by the room tracker, message channel and call session.
pub trait Emitter: Send + Sync {
    /// Fire-and-forget write. A silent no-op unless connected.
    fn emit(&self, event: OutboundEvent);

    /// Current connection state.
    fn state(&self) -> ConnectionState;
}

enum Command {
    Emit(Packet),
    Shutdown,
}

/// State shared between the manager and its receive loop.
struct Shared {
    state: RwLock<ConnectionState>,
    events: Arc<EventDispatcher>,
}

impl Shared {
    /// Writes `state` and publishes it under `epoch` if it changed.
    fn transition(&self, state: ConnectionState, epoch: u64) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(?previous, ?state, "connection state changed");
            self.events
                .publish_from(epoch, SessionEvent::ConnectionStateChanged { state });
        }
    }
}

struct DriverHandle<T> {
    commands: Sender<Command>,
    thread: JoinHandle<T>,
}

/// Connection manager with automatic reconnection and handshake.
///
/// Wraps a transport and adds:
/// - Token handshake on connect
/// - A receive loop on its own thread, the only writer of the socket and of
///   [`ConnectionState`]
/// - Automatic reconnection per [`ReconnectPolicy`]
///
/// # Example
///
/// ```ignore
/// use courier_core::network::{ConnectionConfig, ConnectionManager, WebSocketTransport};
///
/// let events = Arc::new(EventDispatcher::new());
/// let conn = ConnectionManager::new(
///     WebSocketTransport::new(),
///     ConnectionConfig::new("https://api.example.com"),
///     events,
/// );
/// conn.connect("bearer-token");
/// ```
pub struct ConnectionManager<T: Transport + 'static> {
    config: ConnectionConfig,
    shared: Arc<Shared>,
    transport: Mutex<Option<T>>,
    driver: Mutex<Option<DriverHandle<T>>>,
}

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Creates a new, disconnected connection manager.
    pub fn new(transport: T, config: ConnectionConfig, events: Arc<EventDispatcher>) -> Self {
        ConnectionManager {
            config,
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Disconnected),
                events,
            }),
            transport: Mutex::new(Some(transport)),
            driver: Mutex::new(None),
        }
    }

    /// Opens the connection with `token`.
    ///
    /// Any existing connection is torn down first. An endpoint that cannot
    /// be turned into a handshake URL is logged and leaves the manager
    /// `Disconnected`; it is not retried.
    pub fn connect(&self, token: &str) {
        self.teardown();

        let transport_config = match self.config.transport_config(token) {
            Ok(config) => config,
            Err(e) => {
                error!(endpoint = %self.config.endpoint, error = %e, "cannot build handshake URL");
                return;
            }
        };

        let transport = match self.transport.lock().take() {
            Some(transport) => transport,
            None => {
                error!("transport unavailable, connection not started");
                return;
            }
        };

        let (commands, command_rx) = mpsc::channel();
        let driver = Driver {
            transport,
            config: transport_config,
            policy: self.config.reconnect.clone(),
            commands: command_rx,
            shared: Arc::clone(&self.shared),
            epoch: self.shared.events.current_epoch(),
        };

        let spawned = thread::Builder::new()
            .name("courier-receive-loop".into())
            .spawn(move || driver.run());

        match spawned {
            Ok(thread) => {
                info!(endpoint = %self.config.endpoint, "connection started");
                *self.driver.lock() = Some(DriverHandle { commands, thread });
            }
            Err(e) => {
                error!(error = %e, "failed to spawn receive loop, transport lost");
            }
        }
    }

    /// Closes the connection.
    ///
    /// Stops the receive loop and releases the socket before returning.
    /// Events still queued from the closed channel are discarded. An event a
    /// subscriber worker had already picked up is still handed to its
    /// handler and may run after `disconnect` returns; at most one such call
    /// per subscriber. Safe to call multiple times.
    pub fn disconnect(&self) {
        self.teardown();
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Returns true if connected and ready.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Best-effort write of `event`; dropped unless connected.
    pub fn emit(&self, event: OutboundEvent) {
        if !self.is_connected() {
            debug!(event = event.name(), "not connected, dropping outbound event");
            return;
        }
        if let Some(driver) = self.driver.lock().as_ref() {
            trace!(event = event.name(), "queueing outbound event");
            let _ = driver.commands.send(Command::Emit(event.to_packet()));
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn teardown(&self) {
        let handle = self.driver.lock().take();
        let Some(handle) = handle else {
            let epoch = self.shared.events.current_epoch();
            self.shared.transition(ConnectionState::Disconnected, epoch);
            return;
        };

        let epoch = self.shared.events.advance_epoch();
        let _ = handle.commands.send(Command::Shutdown);
        match handle.thread.join() {
            Ok(transport) => *self.transport.lock() = Some(transport),
            Err(_) => error!("receive loop panicked, transport lost"),
        }

        // The loop may have recorded Disconnected under the old epoch; make
        // sure subscribers of the new epoch hear it.
        *self.shared.state.write() = ConnectionState::Disconnected;
        self.shared.events.publish_from(
            epoch,
            SessionEvent::ConnectionStateChanged {
                state: ConnectionState::Disconnected,
            },
        );
        info!("connection closed");
    }
}

impl<T: Transport + 'static> Emitter for ConnectionManager<T> {
    fn emit(&self, event: OutboundEvent) {
        ConnectionManager::emit(self, event);
    }

    fn state(&self) -> ConnectionState {
        ConnectionManager::state(self)
    }
}

impl<T: Transport + 'static> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if self.driver.get_mut().is_some() {
            self.teardown();
        }
    }
}

enum Exit {
    Shutdown,
    Dropped(NetworkError),
}

/// The receive loop. Runs on its own thread and owns the transport.
struct Driver<T: Transport> {
    transport: T,
    config: TransportConfig,
    policy: ReconnectPolicy,
    commands: Receiver<Command>,
    shared: Arc<Shared>,
    epoch: u64,
}

impl<T: Transport> Driver<T> {
    fn run(mut self) -> T {
        let mut attempt: u32 = 0;

        loop {
            self.transition(ConnectionState::Connecting);
            match self.transport.connect(&self.config) {
                Ok(()) => {
                    if attempt > 0 {
                        info!(attempt, "reconnected");
                    } else {
                        info!("connected");
                    }
                    attempt = 0;
                    self.transition(ConnectionState::Connected);

                    match self.pump() {
                        Exit::Shutdown => break,
                        Exit::Dropped(e) => {
                            let _ = self.transport.disconnect();
                            self.transition(ConnectionState::Disconnected);
                            if !e.is_retriable() {
                                warn!(error = %e, "connection ended, not reconnecting");
                                break;
                            }
                            warn!(error = %e, "connection lost");
                        }
                    }
                }
                Err(e) => {
                    let _ = self.transport.disconnect();
                    self.transition(ConnectionState::Disconnected);
                    if !e.is_retriable() {
                        error!(error = %e, "connection rejected, not reconnecting");
                        break;
                    }
                    warn!(attempt, error = %e, "connection attempt failed");
                }
            }

            attempt = attempt.saturating_add(1);
            if !self.policy.allows(attempt) {
                warn!(attempts = attempt - 1, "giving up reconnecting");
                break;
            }
            let delay = self.policy.delay_for(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
            if self.wait(delay) {
                break;
            }
        }

        let _ = self.transport.disconnect();
        self.transport
    }

    /// Moves packets in both directions until the connection drops or a
    /// shutdown is requested.
    fn pump(&mut self) -> Exit {
        loop {
            loop {
                match self.commands.try_recv() {
                    Ok(Command::Emit(packet)) => self.write(&packet),
                    Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => {
                        return Exit::Shutdown
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            match self.transport.receive() {
                Ok(Some(packet)) => {
                    if let Some(e) = self.ingest(packet) {
                        return Exit::Dropped(e);
                    }
                }
                Ok(None) => {}
                Err(e) => return Exit::Dropped(e),
            }
        }
    }

    fn write(&mut self, packet: &Packet) {
        if let Err(e) = self.transport.send(packet) {
            warn!(error = %e, "outbound packet lost");
        }
    }

    fn ingest(&self, packet: Packet) -> Option<NetworkError> {
        match packet {
            Packet::Event { name, data } => {
                debug!(event = %name, "inbound event");
                self.shared.events.publish_from(
                    self.epoch,
                    SessionEvent::Inbound(InboundEvent::new(name, data)),
                );
                None
            }
            Packet::Disconnect => Some(NetworkError::ServerDisconnect),
            Packet::Connect { .. } => {
                trace!("duplicate connect ack ignored");
                None
            }
            Packet::ConnectError { data } => {
                warn!(%data, "connect error while connected, ignored");
                None
            }
        }
    }

    /// Sleeps for `delay`; returns true if a shutdown arrived first. Writes
    /// requested meanwhile are dropped, there is no connection to carry them.
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.commands.recv_timeout(remaining) {
                Ok(Command::Emit(_)) => debug!("dropping outbound packet during backoff"),
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }

    fn transition(&self, state: ConnectionState) {
        self.shared.transition(state, self.epoch);
    }
}
