// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Chat delivery over the realtime socket.

mod channel;
mod message;

pub use channel::MessageChannel;
pub use message::{ChatMessage, MessageKind};
