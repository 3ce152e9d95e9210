//! Stream events and event handlers.
//!
//! A listener surfaces every transport event as a [`StreamEvent`] and hands
//! it to an [`EventHandler`]. The handler's [`HandlerAction`] is passed back
//! to the listener untouched.

use crate::channel::ChannelId;
use crate::endpoint::Endpoint;
use bytes::Bytes;
use tracing::info;

/// An event observed on a listen-role stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The connection to the channel has been established.
    Established {
        /// Server the connection was opened to.
        endpoint: Endpoint,
        /// Channel being listened on.
        channel: ChannelId,
    },
    /// A message arrived on the channel.
    Received(Bytes),
    /// The connection has closed.
    Closed,
}

impl StreamEvent {
    /// Payload of a `Received` event.
    #[must_use]
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Received(payload) => Some(payload),
            _ => None,
        }
    }
}

/// What the listener should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerAction {
    /// Keep the connection open.
    #[default]
    Continue,
    /// Close the connection and stop listening.
    Close,
}

/// Consumer of listener events.
///
/// Implemented for any `Fn(&StreamEvent) -> HandlerAction` closure that is
/// `Send + Sync`, so state can be captured freely.
pub trait EventHandler: Send + Sync {
    /// Handle a single event.
    fn on_event(&self, event: &StreamEvent) -> HandlerAction;
}

impl<F> EventHandler for F
where
    F: Fn(&StreamEvent) -> HandlerAction + Send + Sync,
{
    fn on_event(&self, event: &StreamEvent) -> HandlerAction {
        self(event)
    }
}

/// Handler used when the application has not registered one.
///
/// Logs connection, message and close events and otherwise does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &StreamEvent) -> HandlerAction {
        match event {
            StreamEvent::Established { endpoint, channel } => {
                info!(endpoint = %endpoint, channel = %channel, "Connected to channel server");
            }
            StreamEvent::Received(payload) => {
                info!(
                    len = payload.len(),
                    message = %String::from_utf8_lossy(payload),
                    "Received message"
                );
            }
            StreamEvent::Closed => {
                info!("Connection closed");
            }
        }
        HandlerAction::Continue
    }
}
