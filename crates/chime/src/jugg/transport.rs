// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the Juggernaut socket.
//!
//! Provides a trait-based transport layer that enables:
//! - Real websocket connections (key negotiation + Socket.IO framing)
//! - Mock transports for unit testing
//!
//! The websocket transport treats a server that stays silent for longer
//! than the negotiated close timeout as gone.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chime_core::{Frame, Handshake, Packet};
use reqwest::Url;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Socket key negotiation failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server reported an error and dropped the socket.
    #[error("server error: {0}")]
    Server(String),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A packet could not be decoded. The connection is still usable.
    #[error("protocol error: {0}")]
    Protocol(#[from] chime_core::Error),
}

impl TransportError {
    /// Returns true if the connection survives this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::Protocol(_))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Where and how to reach the Juggernaut service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Base websocket service URL as assigned at registration (usually https).
    pub websocket_url: String,
    /// Session token used as the authentication key.
    pub token: String,
}

impl Endpoint {
    pub fn new(websocket_url: impl Into<String>, token: impl Into<String>) -> Self {
        Endpoint {
            websocket_url: websocket_url.into(),
            token: token.into(),
        }
    }

    fn base(&self) -> TransportResult<Url> {
        Url::parse(&self.websocket_url).map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "invalid websocket url '{}': {}",
                self.websocket_url, e
            ))
        })
    }

    /// URL of the socket key negotiation request.
    pub fn handshake_url(&self, now_ms: i64) -> TransportResult<Url> {
        let mut url = self.base()?;
        if url.scheme() == "ws" || url.scheme() == "wss" {
            let scheme = if url.scheme() == "wss" { "https" } else { "http" };
            set_scheme(&mut url, scheme)?;
        }
        push_segments(&mut url, &["1"])?;
        url.query_pairs_mut()
            .clear()
            .append_pair("session_token", &self.token)
            .append_pair("t", &now_ms.to_string());
        Ok(url)
    }

    /// URL of the websocket itself for a negotiated key.
    pub fn socket_url(&self, key: &str) -> TransportResult<Url> {
        let mut url = self.base()?;
        match url.scheme() {
            "https" => set_scheme(&mut url, "wss")?,
            "http" => set_scheme(&mut url, "ws")?,
            _ => {}
        }
        push_segments(&mut url, &["1", "websocket", key])?;
        url.query_pairs_mut()
            .clear()
            .append_pair("session_token", &self.token);
        Ok(url)
    }
}

fn set_scheme(url: &mut Url, scheme: &str) -> TransportResult<()> {
    url.set_scheme(scheme)
        .map_err(|_| TransportError::ConnectionFailed(format!("cannot use scheme {}", scheme)))
}

fn push_segments(url: &mut Url, segments: &[&str]) -> TransportResult<()> {
    if url.cannot_be_a_base() {
        return Err(TransportError::ConnectionFailed(format!(
            "'{}' cannot be a base",
            url
        )));
    }
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    Ok(())
}

/// Transport trait for the Juggernaut channel.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait Transport: Send + Sync {
    /// Connect to the service.
    fn connect(
        &mut self,
        endpoint: &Endpoint,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Disconnect from the service.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Send a frame.
    fn send(
        &mut self,
        frame: Frame,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Receive the next frame.
    ///
    /// Returns `None` if the connection is closed.
    fn recv(&mut self)
        -> Pin<Box<dyn Future<Output = TransportResult<Option<Frame>>> + Send + '_>>;

    /// Check if connected.
    fn is_connected(&self) -> bool;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Websocket transport implementation using tokio-tungstenite.
pub struct WebSocketTransport {
    http: reqwest::Client,
    /// The websocket connection, if connected.
    ws: Option<WebSocketConnection>,
    /// Key negotiated for the current connection.
    ws_key: Option<String>,
}

struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, tokio_tungstenite::tungstenite::Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
    /// Silence after which the server is considered gone; the handshake's
    /// close timeout, unset when the server advertises none.
    idle_timeout: Option<Duration>,
    last_seen: Instant,
}

impl WebSocketTransport {
    pub fn new(http: reqwest::Client) -> Self {
        WebSocketTransport {
            http,
            ws: None,
            ws_key: None,
        }
    }

    /// Key of the current (or last) connection.
    pub fn ws_key(&self) -> Option<&str> {
        self.ws_key.as_deref()
    }

    async fn negotiate(&self, endpoint: &Endpoint) -> TransportResult<Handshake> {
        let url = endpoint.handshake_url(chrono::Utc::now().timestamp_millis())?;
        let body = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TransportError::Handshake(e.to_string()))?
            .text()
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let handshake = Handshake::parse(&body)?;
        if !handshake.supports_websocket() {
            return Err(TransportError::Handshake(format!(
                "server offers no websocket transport ({})",
                handshake.transports.join(",")
            )));
        }
        Ok(handshake)
    }

    async fn write(&mut self, packet: &Packet) -> TransportResult<()> {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;

        let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;
        let text = packet.encode()?;

        if let Err(e) = ws.sink.send(Message::Text(text.into())).await {
            self.ws = None;
            return Err(TransportError::SendFailed(e.to_string()));
        }
        Ok(())
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl Transport for WebSocketTransport {
    fn connect(
        &mut self,
        endpoint: &Endpoint,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let endpoint = endpoint.clone();
        Box::pin(async move {
            use futures_util::StreamExt;

            let handshake = self.negotiate(&endpoint).await?;
            let url = endpoint.socket_url(&handshake.key)?;

            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            debug!(key = %handshake.key, heartbeat = handshake.heartbeat_secs, "websocket open");
            let (sink, stream) = ws_stream.split();
            let idle_timeout =
                (handshake.close_timeout_secs > 0).then(|| Duration::from_secs(handshake.close_timeout_secs));
            self.ws = Some(WebSocketConnection {
                sink,
                stream,
                idle_timeout,
                last_seen: Instant::now(),
            });
            self.ws_key = Some(handshake.key);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.ws.is_some() {
                let _ = self.write(&Packet::Disconnect).await;
            }
            if let Some(mut ws) = self.ws.take() {
                use futures_util::SinkExt;
                let _ = ws.sink.close().await;
            }
            Ok(())
        })
    }

    fn send(
        &mut self,
        frame: Frame,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            use futures_util::SinkExt;

            self.write(&Packet::Message(frame)).await?;

            // Flush to detect a broken connection now rather than on the next send
            if let Some(ws) = self.ws.as_mut() {
                if let Err(e) = ws.sink.flush().await {
                    self.ws = None;
                    return Err(TransportError::SendFailed(e.to_string()));
                }
            }
            Ok(())
        })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<Frame>>> + Send + '_>> {
        Box::pin(async move {
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::Message;

            loop {
                let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

                // Deadline runs from the last traffic, so a recv dropped by
                // the caller's select does not extend it
                let next = match ws.idle_timeout {
                    Some(idle) => {
                        match tokio::time::timeout_at(ws.last_seen + idle, ws.stream.next()).await {
                            Ok(next) => next,
                            Err(_) => {
                                warn!(?idle, "no traffic from server, dropping connection");
                                self.ws = None;
                                return Err(TransportError::ConnectionClosed);
                            }
                        }
                    }
                    None => ws.stream.next().await,
                };
                ws.last_seen = Instant::now();

                let text = match next {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        self.ws = None;
                        return Ok(None);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        self.ws = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                };

                match Packet::decode(&text)? {
                    Packet::Message(frame) => return Ok(Some(frame)),
                    Packet::Heartbeat => {
                        debug!("heartbeat");
                        self.write(&Packet::Heartbeat).await?;
                    }
                    Packet::Connect | Packet::Noop => {}
                    Packet::Disconnect => {
                        self.ws = None;
                        return Ok(None);
                    }
                    Packet::Error(reason) => {
                        warn!(%reason, "server error packet");
                        self.ws = None;
                        return Err(TransportError::Server(reason));
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}
