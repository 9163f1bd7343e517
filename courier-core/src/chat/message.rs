// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Chat Message Types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type tag carried in the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// Plain text.
    #[default]
    Text,
    /// Any other tag, preserved verbatim.
    Other(String),
}

impl MessageKind {
    /// Wire form of the tag.
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        if tag == "text" {
            MessageKind::Text
        } else {
            MessageKind::Other(tag)
        }
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        MessageKind::from(tag.to_string())
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Text => "text".to_string(),
            MessageKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message delivered by `new_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Room the message was posted to.
    pub conversation_id: String,
    /// Author.
    pub sender_id: String,
    /// Message body.
    pub content: String,
    /// Type tag; `text` when absent.
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// Server timestamp, passed through as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ChatMessage {
    /// Decodes a `new_message` payload.
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        ChatMessage::deserialize(payload)
    }
}
