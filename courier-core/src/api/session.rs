// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Realtime Session
//!
//! The context object built once at app start. It owns the dispatcher, the
//! connection and the three components riding on it, and is passed to
//! whatever needs realtime features.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::config::SessionConfig;
use super::error::{CourierError, CourierResult};
use crate::call::CallSignaling;
use crate::chat::{ChatMessage, MessageChannel, MessageKind};
use crate::events::{
    EventCategory, EventDispatcher, EventHandler, EventStream, SessionEvent, Subscription,
};
use crate::network::{ConnectionManager, ConnectionState, Emitter, Transport};
use crate::rooms::RoomTracker;

/// Realtime session over one authenticated socket.
///
/// # Example
///
/// ```ignore
/// use courier_core::{RealtimeSession, SessionConfig, WebSocketTransport};
///
/// let session = RealtimeSession::new(
///     WebSocketTransport::new(),
///     SessionConfig::new("https://api.example.com"),
/// );
/// session.connect("bearer-token")?;
/// session.join_room("c1");
/// session.send_message("c1", "hi", MessageKind::Text);
///
/// for message in session.messages() {
///     println!("{}: {}", message.sender_id, message.content);
/// }
/// ```
pub struct RealtimeSession<T: Transport + 'static> {
    config: SessionConfig,
    events: Arc<EventDispatcher>,
    connection: Arc<ConnectionManager<T>>,
    rooms: RoomTracker,
    chat: MessageChannel,
    call: CallSignaling,
    shut_down: AtomicBool,
}

impl<T: Transport + 'static> RealtimeSession<T> {
    /// Creates a disconnected session.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let events = Arc::new(EventDispatcher::new());
        let connection = Arc::new(ConnectionManager::new(
            transport,
            config.to_connection_config(),
            Arc::clone(&events),
        ));
        let emitter: Arc<dyn Emitter> = connection.clone();

        RealtimeSession {
            rooms: RoomTracker::new(Arc::clone(&emitter), &events),
            chat: MessageChannel::new(Arc::clone(&emitter), Arc::clone(&events)),
            call: CallSignaling::new(emitter, &events),
            config,
            events,
            connection,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Opens the connection with `token`, replacing any existing one.
    ///
    /// A bad endpoint is logged and leaves the session disconnected.
    pub fn connect(&self, token: &str) -> CourierResult<()> {
        self.ensure_running()?;
        self.connection.connect(token);
        Ok(())
    }

    /// Closes the connection. Joined rooms are kept and rejoined on the
    /// next connect.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Joins a conversation room for the rest of the session.
    pub fn join_room(&self, conversation_id: &str) {
        self.rooms.join_room(conversation_id);
    }

    /// Joined rooms in insertion order.
    pub fn rooms(&self) -> Vec<String> {
        self.rooms.rooms()
    }

    /// Posts a chat message; dropped when not connected.
    pub fn send_message(&self, conversation_id: &str, content: &str, kind: MessageKind) {
        self.chat.send(conversation_id, content, kind);
    }

    /// Opens a stream of incoming chat messages.
    pub fn messages(&self) -> EventStream<ChatMessage> {
        self.chat.messages()
    }

    /// The call signaling session.
    pub fn call(&self) -> &CallSignaling {
        &self.call
    }

    /// Opens a stream of connection state changes.
    pub fn subscribe_connection_state(&self) -> EventStream<ConnectionState> {
        EventStream::subscribe(&self.events, EventCategory::Connection, |event| match event {
            SessionEvent::ConnectionStateChanged { state } => Some(state),
            SessionEvent::Inbound(_) => None,
        })
    }

    /// Registers `handler` for one category.
    pub fn subscribe<H>(&self, category: EventCategory, handler: &Arc<H>) -> Subscription
    where
        H: EventHandler + 'static,
    {
        self.events.subscribe(category, handler)
    }

    /// The session's event dispatcher.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// The configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Disconnects and removes every subscriber. The session cannot be
    /// reconnected afterwards.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connection.disconnect();
        self.events.clear();
        info!("session shut down");
    }

    /// Returns true after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> CourierResult<()> {
        if self.is_shut_down() {
            warn!("connect on a shut down session");
            return Err(CourierError::ShutDown);
        }
        Ok(())
    }
}

/// Builder for a [`RealtimeSession`].
pub struct RealtimeSessionBuilder<T: Transport + 'static> {
    config: SessionConfig,
    transport: Option<T>,
}

impl<T: Transport + 'static> Default for RealtimeSessionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport + 'static> RealtimeSessionBuilder<T> {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        RealtimeSessionBuilder {
            config: SessionConfig::default(),
            transport: None,
        }
    }

    /// Creates a builder configured from the environment.
    pub fn from_env() -> CourierResult<Self> {
        Ok(RealtimeSessionBuilder {
            config: SessionConfig::from_env()?,
            transport: None,
        })
    }

    /// Sets the configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the transport.
    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the session.
    pub fn build(self) -> RealtimeSession<T>
    where
        T: Default,
    {
        let transport = self.transport.unwrap_or_default();
        RealtimeSession::new(transport, self.config)
    }
}
