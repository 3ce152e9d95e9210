//! Transport abstraction traits for Qyun.
//!
//! These traits define what the connection manager and the listener need
//! from a stream transport, so that the lifecycle logic does not depend on
//! a particular protocol implementation.

use async_trait::async_trait;
use bytes::Bytes;
use qyun_core::Endpoint;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let n = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}", n))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be prepared (bad URL, bad header, ...).
    #[error("Setup failed: {0}")]
    Setup(String),

    /// The remote endpoint refused or could not be reached.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("Connection timed out")]
    Timeout,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which side of a channel a connection serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    /// Outbound messages only.
    Send,
    /// Inbound messages only.
    Listen,
}

impl StreamRole {
    /// Subprotocol name announced for this role.
    #[must_use]
    pub fn protocol_name(self) -> &'static str {
        match self {
            Self::Send => "sender-protocol",
            Self::Listen => "channel-protocol",
        }
    }
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Listen => f.write_str("listen"),
        }
    }
}

/// Where and why a stream connection is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    /// Server to connect to.
    pub endpoint: Endpoint,
    /// Request path, already escaped.
    pub path: String,
    /// Role of the connection.
    pub role: StreamRole,
}

impl StreamTarget {
    /// Create a new stream target.
    #[must_use]
    pub fn new(endpoint: Endpoint, path: impl Into<String>, role: StreamRole) -> Self {
        Self {
            endpoint,
            path: path.into(),
            role,
        }
    }

    /// Full `ws://` URL of the target.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.endpoint, self.path)
    }

    /// Value of the `Origin` handshake header.
    #[must_use]
    pub fn origin(&self) -> String {
        self.endpoint.origin()
    }
}

/// Write half of a stream connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Wait until the connection can accept an outbound frame.
    ///
    /// This is the "writable" notification of the transport.
    async fn ready(&mut self) -> Result<(), TransportError>;

    /// Write a single text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a stream connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the next message payload.
    ///
    /// Returns `None` if the connection is closed cleanly.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// An established stream connection.
pub struct StreamConnection {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Write half.
    pub sink: Box<dyn FrameSink>,
    /// Read half.
    pub source: Box<dyn FrameSource>,
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Opens stream connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a connection to the target.
    ///
    /// Returns [`TransportError::Setup`] if the connection could not be
    /// prepared and [`TransportError::Connect`] if the remote side could not
    /// be reached or refused the handshake.
    async fn connect(&self, target: &StreamTarget) -> Result<StreamConnection, TransportError>;

    /// Get the transport name (e.g., "websocket").
    fn name(&self) -> &'static str;
}
