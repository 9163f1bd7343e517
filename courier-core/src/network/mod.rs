// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network + Transport Layer
//!
//! One persistent, authenticated socket multiplexing chat delivery and call
//! signaling.
//!
//! # Architecture
//!
//! The network layer consists of:
//! - **Transport trait**: Platform-agnostic interface for socket I/O
//! - **Protocol layer**: Engine.IO / Socket.IO text framing
//! - **Named events**: Typed outbound events and raw inbound events
//! - **Connection manager**: Handshake, receive loop and reconnection
//!
//! # Example
//!
//! ```ignore
//! use courier_core::network::{ConnectionConfig, ConnectionManager, MockTransport};
//!
//! // Drive a connection over the mock transport (for testing)
//! let transport = MockTransport::new();
//! let events = Arc::new(EventDispatcher::new());
//! let conn = ConnectionManager::new(transport.clone(), ConnectionConfig::new("https://api.example.com"), events);
//!
//! conn.connect("token");
//! conn.emit(OutboundEvent::JoinConversation { conversation_id: "c1".into() });
//! ```

mod connection;
mod endpoint;
mod error;
mod event;
mod mock;
mod protocol;
mod reconnect;
mod transport;
mod websocket;

// Error types
pub use error::NetworkError;

// Named events
pub use event::{names, InboundEvent, InboundKind, OutboundEvent, PeerRef};

// Protocol utilities
pub use protocol::{
    decode_frame, decode_packet, encode_frame, encode_packet, Frame, OpenHandshake, Packet,
    ENGINE_IO_VERSION,
};

// Endpoint handling
pub use endpoint::{handshake_url, DEFAULT_SOCKET_PATH};

// Reconnection
pub use reconnect::{Backoff, ReconnectPolicy};

// Transport abstraction
pub use transport::{ConnectionState, Transport, TransportConfig, TransportKind, TransportResult};

// Mock transport for testing
pub use mock::MockTransport;

// WebSocket transport for production
pub use websocket::WebSocketTransport;

// Connection management
pub use connection::{ConnectionConfig, ConnectionManager, Emitter};
