// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier API Layer
//!
//! The session context applications build once and pass around.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for the API layer
//! - [`config`] - Configuration types and environment loading
//! - [`session`] - The realtime session and its builder

pub mod config;
pub mod error;
pub mod session;

// Error types
pub use error::{CourierError, CourierResult};

// Configuration
pub use config::{ConfigError, SessionConfig};

// Session
pub use session::{RealtimeSession, RealtimeSessionBuilder};
