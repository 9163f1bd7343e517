// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier Core Library
//!
//! Real-time session layer of the Courier mobile client: one authenticated
//! socket carrying chat delivery and peer-to-peer call signaling.

pub mod api;
pub mod call;
pub mod chat;
pub mod events;
pub mod network;
pub mod rooms;

pub use api::{
    ConfigError, CourierError, CourierResult, RealtimeSession, RealtimeSessionBuilder,
    SessionConfig,
};
pub use call::{
    CallDirection, CallError, CallEvent, CallSession, CallSignaling, CallState, EndReason,
};
pub use chat::{ChatMessage, MessageChannel, MessageKind};
pub use events::{
    CallbackHandler, EventCategory, EventDispatcher, EventHandler, EventStream, SessionEvent,
    Subscription,
};
pub use network::{
    ConnectionConfig, ConnectionManager, ConnectionState, Emitter, MockTransport, NetworkError,
    OutboundEvent, PeerRef, ReconnectPolicy, Transport, WebSocketTransport,
};
pub use rooms::RoomTracker;
