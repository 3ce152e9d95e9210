//! Error types for client operations.
//!
//! Every failure cause has its own variant so callers can tell a refused
//! connection from a send that simply did not complete in time.

use qyun_core::EndpointError;
use qyun_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors from sending over the persistent stream connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The channel name was rejected before anything was opened.
    #[error("Invalid channel name: {0}")]
    InvalidChannel(&'static str),

    /// The connection could not be prepared; no session is active.
    #[error("Stream setup failed: {0}")]
    SetupFailed(String),

    /// The server could not be reached; no session is active.
    #[error("Stream connect failed: {0}")]
    ConnectFailed(#[source] TransportError),

    /// The message was not flushed within the send timeout.
    #[error("Message not sent within {0:?}")]
    Timeout(Duration),

    /// The flush itself failed; the connection is treated as closed.
    #[error("Stream write failed: {0}")]
    WriteFailed(#[source] TransportError),

    /// A newer message replaced this one before it was flushed, or the
    /// session was torn down while the message was pending.
    #[error("Pending message was superseded before it was sent")]
    Superseded,
}

impl SendError {
    /// Check if the send timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if the failure happened while opening the session.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::SetupFailed(_) | Self::ConnectFailed(_))
    }
}

/// Errors from listening on a channel.
#[derive(Debug, Error)]
pub enum ListenError {
    /// The channel name was rejected before anything was opened.
    #[error("Invalid channel name: {0}")]
    InvalidChannel(&'static str),

    /// The connection could not be prepared.
    #[error("Listen setup failed: {0}")]
    SetupFailed(String),

    /// The server could not be reached or refused the channel.
    #[error("Listen connect failed: {0}")]
    ConnectFailed(#[source] TransportError),

    /// The established connection failed while receiving.
    #[error("Listen connection failed: {0}")]
    Receive(#[source] TransportError),
}

/// Errors from one-shot requests.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The channel name was rejected before anything was sent.
    #[error("Invalid channel name: {0}")]
    InvalidChannel(&'static str),

    /// The HTTP client could not be built.
    #[error("Request client setup failed: {0}")]
    Setup(#[source] reqwest::Error),

    /// The request did not complete at the transport level.
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with a status other than 200.
    #[error("Request rejected with HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

impl RequestError {
    /// HTTP status of a rejected request.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from building a [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured endpoint is malformed.
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    /// The request client could not be built.
    #[error(transparent)]
    Request(#[from] RequestError),
}
