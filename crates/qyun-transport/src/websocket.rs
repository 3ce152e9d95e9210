//! WebSocket transport implementation.
//!
//! This module provides a WebSocket client transport using tokio-tungstenite.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{future, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{
        client::IntoClientRequest,
        http::{header, HeaderValue},
        protocol::WebSocketConfig as ProtocolConfig,
        Error as WsError, Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, trace, warn};

use crate::traits::{
    ConnectionId, Connector, FrameSink, FrameSource, StreamConnection, StreamTarget,
    TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum message size in bytes.
    pub max_message_size: usize,
    /// Announce the role's subprotocol in the handshake.
    ///
    /// The server must echo it back, so this is off by default.
    pub announce_subprotocol: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64 KB
            announce_subprotocol: false,
        }
    }
}

/// WebSocket client connector.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    /// Create a new WebSocket connector.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Get the connector configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    fn protocol_config(&self) -> ProtocolConfig {
        let mut config = ProtocolConfig::default();
        config.max_message_size = Some(self.config.max_message_size);
        config.max_frame_size = Some(self.config.max_message_size);
        config
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, target: &StreamTarget) -> Result<StreamConnection, TransportError> {
        let url = target.url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Setup(format!("Invalid stream URL {}: {}", url, e)))?;

        let origin = HeaderValue::from_str(&target.origin())
            .map_err(|e| TransportError::Setup(format!("Invalid origin: {}", e)))?;
        request.headers_mut().insert(header::ORIGIN, origin);

        if self.config.announce_subprotocol {
            request.headers_mut().insert(
                header::SEC_WEBSOCKET_PROTOCOL,
                HeaderValue::from_static(target.role.protocol_name()),
            );
        }

        debug!(url = %url, role = %target.role, "Opening WebSocket connection");

        let (stream, response) =
            connect_async_with_config(request, Some(self.protocol_config()), true)
                .await
                .map_err(|e| {
                    error!(url = %url, error = %e, "WebSocket handshake failed");
                    TransportError::Connect(e.to_string())
                })?;

        let id = ConnectionId::generate();
        debug!(
            connection = %id,
            url = %url,
            status = response.status().as_u16(),
            "WebSocket handshake completed"
        );

        let (sink, source) = stream.split();
        Ok(StreamConnection {
            sink: Box::new(WebSocketSink {
                id: id.clone(),
                inner: sink,
            }),
            source: Box::new(WebSocketSource {
                id: id.clone(),
                inner: source,
            }),
            id,
        })
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Write half of a WebSocket connection.
pub struct WebSocketSink {
    id: ConnectionId,
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn ready(&mut self) -> Result<(), TransportError> {
        future::poll_fn(|cx| self.inner.poll_ready_unpin(cx))
            .await
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => {
                    TransportError::ConnectionClosed
                }
                e => TransportError::SendFailed(e.to_string()),
            })
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        trace!(connection = %self.id, len = text.len(), "Sending text frame");
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.inner.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(format!("Failed to close: {}", e))),
        }
    }
}

/// Read half of a WebSocket connection.
pub struct WebSocketSource {
    id: ConnectionId,
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Bytes::from(text))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(Bytes::from(data))),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Pongs are queued by tungstenite and flushed with the next write
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(connection = %self.id, frame = ?frame, "Received close frame");
                    return Ok(None);
                }
                Some(Ok(Message::Frame(_))) => {
                    // Raw frame, ignore
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    debug!(connection = %self.id, "Connection closed");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    warn!(connection = %self.id, error = %e, "WebSocket error");
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    debug!(connection = %self.id, "WebSocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}
