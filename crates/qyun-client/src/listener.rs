//! Stream listener.
//!
//! A listener opens its own connection to a channel's listen route and
//! forwards every event on it to the dispatch registry until the connection
//! closes, the handler asks to stop, or the caller cancels.

use crate::error::ListenError;
use crate::metrics;
use qyun_core::{
    channel, validate_channel_name, DispatchRegistry, Endpoint, HandlerAction, StreamEvent,
};
use qyun_transport::{Connector, FrameSink, StreamRole, StreamTarget, TransportError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a listen loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenExit {
    /// The caller cancelled the listen.
    Cancelled,
    /// The server closed the connection.
    Closed,
    /// The handler returned [`HandlerAction::Close`].
    HandlerClosed,
}

/// Opens listen-role connections and drives their event loops.
pub struct Listener {
    connector: Arc<dyn Connector>,
    registry: Arc<DispatchRegistry>,
    connect_timeout: Duration,
}

impl Listener {
    /// Create a new listener.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        registry: Arc<DispatchRegistry>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            registry,
            connect_timeout,
        }
    }

    /// Get the dispatch registry events are routed through.
    #[must_use]
    pub fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.registry
    }

    /// Listen on a channel until cancelled or the connection ends.
    ///
    /// Every call opens an independent connection. Once established, each
    /// received payload is dispatched verbatim, and a final
    /// [`StreamEvent::Closed`] is dispatched however the loop ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened, or if it fails
    /// while receiving.
    pub async fn listen(
        &self,
        endpoint: &Endpoint,
        channel: &str,
        cancel: CancellationToken,
    ) -> Result<ListenExit, ListenError> {
        validate_channel_name(channel).map_err(ListenError::InvalidChannel)?;

        let target = StreamTarget::new(
            endpoint.clone(),
            channel::listen_path(channel),
            StreamRole::Listen,
        );

        info!(endpoint = %endpoint, channel = %channel, "Connecting listener");

        let connection = match timeout(self.connect_timeout, self.connector.connect(&target)).await
        {
            Ok(Ok(connection)) => connection,
            Ok(Err(TransportError::Setup(reason))) => {
                warn!(channel = %channel, reason = %reason, "Listen setup failed");
                return Err(ListenError::SetupFailed(reason));
            }
            Ok(Err(e)) => {
                warn!(channel = %channel, error = %e, "Listen connect failed");
                return Err(ListenError::ConnectFailed(e));
            }
            Err(_) => {
                warn!(channel = %channel, "Listen connect timed out");
                return Err(ListenError::ConnectFailed(TransportError::Timeout));
            }
        };
        metrics::record_connect("listen");

        let id = connection.id;
        let mut sink = connection.sink;
        let mut source = connection.source;
        info!(connection = %id, channel = %channel, "Listening on channel");

        let established = StreamEvent::Established {
            endpoint: endpoint.clone(),
            channel: channel.to_string(),
        };
        if self.registry.dispatch(&established) == HandlerAction::Close {
            return Ok(self.finish(&mut sink, ListenExit::HandlerClosed).await);
        }

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!(connection = %id, "Listen cancelled");
                    return Ok(self.finish(&mut sink, ListenExit::Cancelled).await);
                }

                received = source.recv() => match received {
                    Ok(Some(payload)) => {
                        metrics::record_received();
                        let action = self.registry.dispatch(&StreamEvent::Received(payload));
                        if action == HandlerAction::Close {
                            debug!(connection = %id, "Handler closed the connection");
                            return Ok(self.finish(&mut sink, ListenExit::HandlerClosed).await);
                        }
                    }
                    Ok(None) => {
                        debug!(connection = %id, "Listen connection closed by server");
                        self.registry.dispatch(&StreamEvent::Closed);
                        return Ok(ListenExit::Closed);
                    }
                    Err(e) => {
                        warn!(connection = %id, error = %e, "Listen connection failed");
                        self.registry.dispatch(&StreamEvent::Closed);
                        return Err(ListenError::Receive(e));
                    }
                },
            }
        }
    }

    /// Close the connection locally and report the close to the handler.
    async fn finish(&self, sink: &mut Box<dyn FrameSink>, exit: ListenExit) -> ListenExit {
        if let Err(e) = sink.close().await {
            debug!(error = %e, "Error while closing listen connection");
        }
        self.registry.dispatch(&StreamEvent::Closed);
        exit
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("transport", &self.connector.name())
            .field("registry", &self.registry)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
