// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Handshake URL construction.

use url::Url;

use super::error::NetworkError;
use super::protocol::ENGINE_IO_VERSION;
use super::transport::TransportKind;

/// Socket path used by the server when none is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io/";

/// Builds the websocket handshake URL for `endpoint`.
///
/// `http`/`https` endpoints are mapped to `ws`/`wss`. The token travels as the
/// `token` query parameter next to the Engine.IO version and the forced
/// transport.
pub fn handshake_url(
    endpoint: &str,
    path: &str,
    token: &str,
    transport: TransportKind,
) -> Result<String, NetworkError> {
    let mut url = Url::parse(endpoint.trim())
        .map_err(|e| NetworkError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(NetworkError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| NetworkError::InvalidEndpoint(format!("cannot use scheme {}", scheme)))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(NetworkError::InvalidEndpoint(format!(
            "missing host in {}",
            endpoint
        )));
    }

    url.set_path(&normalize_path(path));
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
        .append_pair("transport", transport.as_query_value())
        .append_pair("token", token);

    Ok(url.into())
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_SOCKET_PATH.to_string();
    }
    format!("/{}/", trimmed)
}
