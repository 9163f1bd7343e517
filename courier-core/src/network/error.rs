// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Errors

use thiserror::Error;

/// Errors raised by the transport layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The endpoint URL could not be turned into a handshake URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Establishing the connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server rejected the auth token.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The connection was closed by the peer or dropped.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server explicitly disconnected this client.
    #[error("disconnected by server")]
    ServerDisconnect,

    /// No frame arrived within the negotiated ping window.
    #[error("ping timeout after {0} ms")]
    PingTimeout(u64),

    /// Operation requires an open connection.
    #[error("not connected")]
    NotConnected,

    /// Writing to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame could not be decoded.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The handshake did not complete in time.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

impl NetworkError {
    /// Returns true if the reconnection policy should try again after this error.
    ///
    /// Auth rejections and server-initiated disconnects are final, as is a
    /// malformed endpoint.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            NetworkError::InvalidEndpoint(_)
                | NetworkError::AuthenticationFailed(_)
                | NetworkError::ServerDisconnect
        )
    }
}
