// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! WebSocket Transport
//!
//! Real transport implementation using tungstenite. Speaks the Engine.IO
//! framing directly over the websocket (no long-polling), performs the token
//! handshake and answers keep-alive pings.
//! Supports both native-tls and rustls TLS backends.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

#[cfg(all(feature = "network-native-tls", not(feature = "network-rustls")))]
use native_tls::TlsConnector;

#[cfg(feature = "network-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "network-rustls")]
use std::sync::Arc;

use tracing::{debug, trace, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::HandshakeError;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::{Host, Url};

use super::error::NetworkError;
use super::protocol::{decode_frame, encode_frame, Frame, OpenHandshake, Packet};
use super::transport::{ConnectionState, Transport, TransportConfig, TransportResult};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for the real-time session.
///
/// Supports both ws:// (plaintext) and wss:// (TLS) connections.
///
/// # Example
///
/// ```ignore
/// use courier_core::network::{handshake_url, TransportConfig, TransportKind, WebSocketTransport};
///
/// let mut transport = WebSocketTransport::new();
/// let config = TransportConfig {
///     server_url: handshake_url("https://api.example.com", "/socket.io/", "abc", TransportKind::WebSocket)?,
///     auth_token: "abc".into(),
///     ..Default::default()
/// };
/// transport.connect(&config)?;
/// ```
pub struct WebSocketTransport {
    socket: Option<Socket>,
    /// Second handle on the TCP socket, used to adjust read timeouts after
    /// the stream has been wrapped in TLS.
    tcp: Option<TcpStream>,
    state: ConnectionState,
    liveness_window: Option<Duration>,
    last_frame_at: Instant,
}

impl WebSocketTransport {
    /// Creates a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport {
            socket: None,
            tcp: None,
            state: ConnectionState::Disconnected,
            liveness_window: None,
            last_frame_at: Instant::now(),
        }
    }

    /// Parses a WebSocket URL into host, port and TLS flag.
    ///
    /// IPv6 hosts come back without brackets, ready for address lookup.
    fn parse_url(url: &str) -> Result<(String, u16, bool), NetworkError> {
        let parsed = Url::parse(url)
            .map_err(|e| NetworkError::InvalidEndpoint(format!("{}: {}", url, e)))?;

        let is_tls = match parsed.scheme() {
            "wss" => true,
            "ws" => false,
            other => {
                return Err(NetworkError::InvalidEndpoint(format!(
                    "Invalid URL scheme {:?} (expected ws:// or wss://)",
                    other
                )))
            }
        };

        let host = match parsed.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(NetworkError::InvalidEndpoint("Missing host".into())),
        };
        let port = parsed
            .port_or_known_default()
            .unwrap_or(if is_tls { 443 } else { 80 });

        Ok((host, port, is_tls))
    }

    fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, NetworkError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| NetworkError::ConnectionFailed(format!("Resolve {}: {}", host, e)))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(NetworkError::ConnectionFailed(match last_error {
            Some(e) => e.to_string(),
            None => format!("No address for {}", host),
        }))
    }

    /// Create a TLS stream using native-tls
    #[cfg(all(feature = "network-native-tls", not(feature = "network-rustls")))]
    fn create_tls_stream(
        host: &str,
        tcp_stream: TcpStream,
    ) -> Result<MaybeTlsStream<TcpStream>, NetworkError> {
        let connector = TlsConnector::new()
            .map_err(|e| NetworkError::ConnectionFailed(format!("TLS error: {}", e)))?;
        let tls_stream = connector
            .connect(host, tcp_stream)
            .map_err(|e| NetworkError::ConnectionFailed(format!("TLS handshake failed: {}", e)))?;
        Ok(MaybeTlsStream::NativeTls(tls_stream))
    }

    /// Create a TLS stream using rustls
    #[cfg(feature = "network-rustls")]
    fn create_tls_stream(
        host: &str,
        tcp_stream: TcpStream,
    ) -> Result<MaybeTlsStream<TcpStream>, NetworkError> {
        // Create root certificate store from webpki roots
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let server_name: ServerName<'_> = host.try_into().map_err(|_| {
            NetworkError::ConnectionFailed(format!("Invalid server name: {}", host))
        })?;

        let tls_conn = rustls::ClientConnection::new(Arc::new(config), server_name.to_owned())
            .map_err(|e| NetworkError::ConnectionFailed(format!("TLS setup failed: {}", e)))?;

        let tls_stream = rustls::StreamOwned::new(tls_conn, tcp_stream);
        Ok(MaybeTlsStream::Rustls(tls_stream))
    }

    #[cfg(not(any(feature = "network-native-tls", feature = "network-rustls")))]
    fn create_tls_stream(
        _host: &str,
        _tcp_stream: TcpStream,
    ) -> Result<MaybeTlsStream<TcpStream>, NetworkError> {
        Err(NetworkError::ConnectionFailed(
            "wss:// requires a TLS feature".into(),
        ))
    }

    /// Opens the socket and runs the Engine.IO + namespace handshake.
    fn open(&mut self, config: &TransportConfig) -> TransportResult<()> {
        let (host, port, is_tls) = Self::parse_url(&config.server_url)?;
        let connect_timeout = config.connect_timeout();

        let tcp_stream = Self::connect_tcp(&host, port, connect_timeout)?;
        let tcp_handle = tcp_stream
            .try_clone()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        set_timeouts(&tcp_handle, connect_timeout)?;

        // Wrap in TLS if needed
        let stream: MaybeTlsStream<TcpStream> = if is_tls {
            Self::create_tls_stream(&host, tcp_stream)?
        } else {
            MaybeTlsStream::Plain(tcp_stream)
        };

        let request = config
            .server_url
            .as_str()
            .into_client_request()
            .map_err(|e| {
                NetworkError::InvalidEndpoint(format!("Invalid WebSocket request: {}", e))
            })?;

        let (socket, _response) = tungstenite::client(request, stream).map_err(|e| match e {
            HandshakeError::Interrupted(_) => NetworkError::HandshakeTimeout,
            HandshakeError::Failure(e) => {
                NetworkError::ConnectionFailed(format!("WebSocket handshake failed: {}", e))
            }
        })?;

        set_timeouts(&tcp_handle, config.io_timeout())?;
        self.socket = Some(socket);
        self.tcp = Some(tcp_handle);
        self.last_frame_at = Instant::now();

        let deadline = Instant::now() + connect_timeout;
        let open = self.await_open(deadline)?;
        debug!(sid = %open.sid, ping_interval = open.ping_interval, "engine session open");
        self.liveness_window = Some(Duration::from_millis(open.liveness_window_ms()));

        self.write_frame(&Frame::Message(Packet::connect_with_token(&config.auth_token)))?;
        self.await_connect_ack(deadline)
    }

    fn await_open(&mut self, deadline: Instant) -> TransportResult<OpenHandshake> {
        loop {
            match self.read_frame()? {
                Some(Frame::Open(open)) => return Ok(open),
                Some(Frame::Ping) => self.write_frame(&Frame::Pong)?,
                Some(Frame::Close) => return Err(NetworkError::ConnectionClosed),
                Some(other) => trace!(?other, "ignoring frame before open"),
                None => {}
            }
            if Instant::now() >= deadline {
                return Err(NetworkError::HandshakeTimeout);
            }
        }
    }

    fn await_connect_ack(&mut self, deadline: Instant) -> TransportResult<()> {
        loop {
            match self.read_frame()? {
                Some(Frame::Message(Packet::Connect { .. })) => return Ok(()),
                Some(Frame::Message(Packet::ConnectError { data })) => {
                    let reason = data
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| data.to_string());
                    return Err(NetworkError::AuthenticationFailed(reason));
                }
                Some(Frame::Message(Packet::Disconnect)) => {
                    return Err(NetworkError::ServerDisconnect)
                }
                Some(Frame::Ping) => self.write_frame(&Frame::Pong)?,
                Some(Frame::Close) => return Err(NetworkError::ConnectionClosed),
                Some(other) => trace!(?other, "ignoring frame before connect ack"),
                None => {}
            }
            if Instant::now() >= deadline {
                return Err(NetworkError::HandshakeTimeout);
            }
        }
    }

    /// Reads one websocket message and decodes it as an engine frame.
    ///
    /// Returns `Ok(None)` on read timeout and for frames that were dropped
    /// because they could not be decoded.
    fn read_frame(&mut self) -> TransportResult<Option<Frame>> {
        let socket = self.socket.as_mut().ok_or(NetworkError::NotConnected)?;

        match socket.read() {
            Ok(Message::Text(text)) => {
                self.last_frame_at = Instant::now();
                match decode_frame(&text) {
                    Ok(frame) => Ok(Some(frame)),
                    Err(e) => {
                        warn!(error = %e, "dropping malformed frame");
                        Ok(None)
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                self.last_frame_at = Instant::now();
                debug!("binary frame ignored");
                Ok(None)
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                // tungstenite queues the pong itself
                self.last_frame_at = Instant::now();
                Ok(None)
            }
            Ok(Message::Close(_)) => Err(NetworkError::ConnectionClosed),
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(NetworkError::ConnectionClosed)
            }
            Err(e) => Err(NetworkError::ReceiveFailed(e.to_string())),
        }
    }

    fn write_frame(&mut self, frame: &Frame) -> TransportResult<()> {
        let socket = self.socket.as_mut().ok_or(NetworkError::NotConnected)?;
        let text = encode_frame(frame)?;

        socket.send(Message::Text(text)).map_err(|e| {
            if matches!(
                e,
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
            ) {
                NetworkError::ConnectionClosed
            } else {
                NetworkError::SendFailed(e.to_string())
            }
        })
    }

    fn close_socket(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None); // Ignore errors on close
            let _ = socket.flush();
        }
        self.tcp = None;
        self.liveness_window = None;
        self.state = ConnectionState::Disconnected;
    }

    fn liveness_expired(&self) -> Option<u64> {
        let window = self.liveness_window?;
        let silent = self.last_frame_at.elapsed();
        (silent > window).then(|| silent.as_millis() as u64)
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, config: &TransportConfig) -> TransportResult<()> {
        if matches!(self.state, ConnectionState::Connected) {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        match self.open(config) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.close_socket();
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        if self.state.is_connected() {
            let _ = self.write_frame(&Frame::Message(Packet::Disconnect));
        }
        self.close_socket();
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn send(&mut self, packet: &Packet) -> TransportResult<()> {
        if !self.state.is_connected() {
            return Err(NetworkError::NotConnected);
        }
        self.write_frame(&Frame::Message(packet.clone()))
            .inspect_err(|e| {
                if matches!(e, NetworkError::ConnectionClosed) {
                    self.state = ConnectionState::Disconnected;
                }
            })
    }

    fn receive(&mut self) -> TransportResult<Option<Packet>> {
        if !self.state.is_connected() {
            return Err(NetworkError::NotConnected);
        }

        let frame = match self.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.close_socket();
                return Err(e);
            }
        };

        match frame {
            Some(Frame::Message(Packet::Disconnect)) => {
                self.close_socket();
                Err(NetworkError::ServerDisconnect)
            }
            Some(Frame::Message(packet)) => Ok(Some(packet)),
            Some(Frame::Ping) => {
                self.write_frame(&Frame::Pong)?;
                Ok(None)
            }
            Some(Frame::Close) => {
                self.close_socket();
                Err(NetworkError::ConnectionClosed)
            }
            Some(Frame::Open(_)) | Some(Frame::Pong) | Some(Frame::Noop) | None => {
                match self.liveness_expired() {
                    Some(silent_ms) => {
                        self.close_socket();
                        Err(NetworkError::PingTimeout(silent_ms))
                    }
                    None => Ok(None),
                }
            }
        }
    }
}

fn set_timeouts(tcp: &TcpStream, timeout: Duration) -> Result<(), NetworkError> {
    tcp.set_read_timeout(Some(timeout))
        .and_then(|_| tcp.set_write_timeout(Some(timeout)))
        .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))
}

// INLINE_TEST_REQUIRED: Tests private parse_url function for URL parsing logic
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_wss() {
        let (host, port, is_tls) =
            WebSocketTransport::parse_url("wss://api.example.com/socket.io/?EIO=4").unwrap();
        assert_eq!(host, "api.example.com");
        assert_eq!(port, 443);
        assert!(is_tls);
    }

    #[test]
    fn test_parse_url_ws_with_port() {
        let (host, port, is_tls) =
            WebSocketTransport::parse_url("ws://localhost:3000/socket.io/").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 3000);
        assert!(!is_tls);
    }

    #[test]
    fn test_parse_url_query_without_path() {
        let (host, port, _) = WebSocketTransport::parse_url("ws://chat.local?EIO=4").unwrap();
        assert_eq!(host, "chat.local");
        assert_eq!(port, 80);
    }

    #[test]
    fn test_parse_url_ipv6_host_loses_brackets() {
        let (host, port, is_tls) =
            WebSocketTransport::parse_url("ws://[::1]:3000/socket.io/?EIO=4").unwrap();
        assert_eq!(host, "::1");
        assert_eq!(port, 3000);
        assert!(!is_tls);
        assert!((host.as_str(), port).to_socket_addrs().is_ok());
    }

    #[test]
    fn test_parse_url_ipv6_from_handshake_url() {
        let url = crate::network::handshake_url(
            "https://[2001:db8::1]",
            crate::network::DEFAULT_SOCKET_PATH,
            "abc",
            crate::network::TransportKind::WebSocket,
        )
        .unwrap();
        let (host, port, is_tls) = WebSocketTransport::parse_url(&url).unwrap();
        assert_eq!(host, "2001:db8::1");
        assert_eq!(port, 443);
        assert!(is_tls);
    }

    #[test]
    fn test_parse_url_garbage_is_invalid_endpoint() {
        let result = WebSocketTransport::parse_url("not a url");
        assert!(matches!(result, Err(NetworkError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_parse_url_invalid_scheme() {
        let result = WebSocketTransport::parse_url("http://example.com");
        assert!(matches!(result, Err(NetworkError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_new_transport_disconnected() {
        let transport = WebSocketTransport::new();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_without_connect_fails() {
        let mut transport = WebSocketTransport::new();
        let result = transport.send(&Packet::event("send_message", serde_json::json!({})));
        assert!(matches!(result, Err(NetworkError::NotConnected)));
    }

    #[test]
    fn test_receive_without_connect_fails() {
        let mut transport = WebSocketTransport::new();
        let result = transport.receive();
        assert!(matches!(result, Err(NetworkError::NotConnected)));
    }

    #[test]
    fn test_disconnect_when_not_connected_ok() {
        let mut transport = WebSocketTransport::new();
        assert!(transport.disconnect().is_ok());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_liveness_not_tracked_before_open() {
        let transport = WebSocketTransport::new();
        assert!(transport.liveness_expired().is_none());
    }
}
