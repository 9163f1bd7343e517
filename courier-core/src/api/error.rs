// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! API Error Types
//!
//! Unified error type for the Courier API layer.

use thiserror::Error;

use super::config::ConfigError;
use crate::call::CallError;
use crate::network::NetworkError;

/// Unified error type for Courier operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CourierError {
    /// Network operation failed.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Call operation rejected.
    #[error("call error: {0}")]
    Call(#[from] CallError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session was shut down.
    #[error("session shut down")]
    ShutDown,
}

/// Result type for Courier operations.
pub type CourierResult<T> = Result<T, CourierError>;
