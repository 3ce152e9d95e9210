//! # qyun-transport
//!
//! Stream transport layer for the Qyun channel messaging client.
//!
//! The client never talks to a socket directly. It asks a [`Connector`] for
//! a [`StreamConnection`], which is split into a [`FrameSink`] for writing
//! and a [`FrameSource`] for reading:
//!
//! - **WebSocket** - The default transport, built on tokio-tungstenite
//!
//! ```rust,ignore
//! use qyun_transport::{Connector, StreamRole, StreamTarget, WebSocketConnector};
//!
//! async fn open(endpoint: qyun_core::Endpoint) {
//!     let connector = WebSocketConnector::default();
//!     let target = StreamTarget::new(endpoint, "/channel/listen/test", StreamRole::Listen);
//!     let mut conn = connector.connect(&target).await.unwrap();
//!     while let Ok(Some(payload)) = conn.source.recv().await {
//!         // Process payload
//!     }
//! }
//! ```

pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use traits::{
    ConnectionId, Connector, FrameSink, FrameSource, StreamConnection, StreamRole, StreamTarget,
    TransportError,
};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketConnector};
