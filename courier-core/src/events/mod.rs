// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event System
//!
//! Decouples the transport's receive loop from the components reacting to
//! it. The connection publishes; the room tracker, message channel, call
//! session and UI observers subscribe per category.

pub mod dispatcher;
pub mod stream;

pub use dispatcher::{
    CallbackHandler, EventCategory, EventDispatcher, EventHandler, SessionEvent, Subscription,
};
pub use stream::EventStream;
