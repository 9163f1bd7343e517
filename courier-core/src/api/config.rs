// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! API Configuration
//!
//! Configuration types for the realtime session, with an environment
//! loader for the settings a deployment varies.

use std::time::Duration;

use thiserror::Error;

use crate::network::{ConnectionConfig, ReconnectPolicy, TransportKind, DEFAULT_SOCKET_PATH};

/// Base endpoint URL.
pub const ENV_ENDPOINT: &str = "COURIER_ENDPOINT";
/// Socket path on the endpoint.
pub const ENV_SOCKET_PATH: &str = "COURIER_SOCKET_PATH";
/// Reconnection attempt bound: an integer or `unlimited`.
pub const ENV_RECONNECT_ATTEMPTS: &str = "COURIER_RECONNECT_ATTEMPTS";
/// Initial reconnection delay in milliseconds.
pub const ENV_RECONNECT_DELAY_MS: &str = "COURIER_RECONNECT_DELAY_MS";
/// Reconnection delay cap in milliseconds.
pub const ENV_RECONNECT_MAX_DELAY_MS: &str = "COURIER_RECONNECT_MAX_DELAY_MS";

/// Configuration loading errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

/// Configuration for a realtime session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base endpoint URL.
    pub endpoint: String,

    /// Socket path on the endpoint.
    pub path: String,

    /// Forced wire transport.
    pub transport: TransportKind,

    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Read timeout of the receive loop in milliseconds.
    pub io_timeout_ms: u64,

    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        SessionConfig {
            endpoint: connection.endpoint,
            path: connection.path,
            transport: connection.transport,
            connect_timeout_ms: connection.connect_timeout_ms,
            io_timeout_ms: connection.io_timeout_ms,
            reconnect: connection.reconnect,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        SessionConfig {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Loads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SessionConfig::default();

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(path) = lookup(ENV_SOCKET_PATH) {
            config.path = path;
        }
        if let Some(raw) = lookup(ENV_RECONNECT_ATTEMPTS) {
            config.reconnect.max_attempts = parse_attempts(&raw)?;
        }

        let initial = match lookup(ENV_RECONNECT_DELAY_MS) {
            Some(raw) => parse_millis(ENV_RECONNECT_DELAY_MS, &raw)?,
            None => config.reconnect.initial_delay,
        };
        let max = match lookup(ENV_RECONNECT_MAX_DELAY_MS) {
            Some(raw) => parse_millis(ENV_RECONNECT_MAX_DELAY_MS, &raw)?,
            None => config.reconnect.max_delay,
        };
        config.reconnect = config.reconnect.with_delays(initial, max);

        Ok(config)
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

    /// Converts to the connection manager's configuration.
    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            endpoint: self.endpoint.clone(),
            path: self.path.clone(),
            transport: self.transport,
            connect_timeout_ms: self.connect_timeout_ms,
            io_timeout_ms: self.io_timeout_ms,
            reconnect: self.reconnect.clone(),
        }
    }
}

fn parse_attempts(raw: &str) -> Result<Option<u32>, ConfigError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unlimited") {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| invalid(ENV_RECONNECT_ATTEMPTS, raw, "a count or `unlimited`"))
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| invalid(key, raw, "milliseconds"))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
