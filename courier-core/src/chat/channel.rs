// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message Channel
//!
//! Sends chat messages and turns `new_message` events into a stream of
//! [`ChatMessage`] values. Delivery is at-most-once: nothing is
//! acknowledged, buffered while offline or replayed after a reconnect.

use std::sync::Arc;

use tracing::{debug, warn};

use super::message::{ChatMessage, MessageKind};
use crate::events::{EventCategory, EventDispatcher, EventStream, SessionEvent};
use crate::network::{Emitter, InboundKind, OutboundEvent};

/// Chat send and receive over the shared socket.
pub struct MessageChannel {
    emitter: Arc<dyn Emitter>,
    dispatcher: Arc<EventDispatcher>,
}

impl MessageChannel {
    /// Creates a channel.
    pub fn new(emitter: Arc<dyn Emitter>, dispatcher: Arc<EventDispatcher>) -> Self {
        MessageChannel {
            emitter,
            dispatcher,
        }
    }

    /// Posts a message and returns immediately.
    ///
    /// Silently dropped when not connected. The server echoes the message
    /// back as `new_message`; no local correlation is done.
    pub fn send(&self, conversation_id: &str, content: &str, kind: MessageKind) {
        debug!(conversation_id, kind = %kind, "sending message");
        self.emitter.emit(OutboundEvent::SendMessage {
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
            kind: kind.into(),
        });
    }

    /// Opens a stream of incoming messages.
    ///
    /// Each call opens an independent stream that sees messages arriving
    /// from now on. Malformed payloads are logged and skipped.
    pub fn messages(&self) -> EventStream<ChatMessage> {
        EventStream::subscribe(&self.dispatcher, EventCategory::Chat, |event| {
            let SessionEvent::Inbound(inbound) = event else {
                return None;
            };
            if inbound.kind() != InboundKind::NewMessage {
                return None;
            }
            match ChatMessage::from_payload(&inbound.payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, "dropping undecodable new_message");
                    None
                }
            }
        })
    }
}
