//! High-level client facade.

use crate::config::ClientConfig;
use crate::error::{ClientError, ListenError, RequestError, SendError};
use crate::listener::{ListenExit, Listener};
use crate::manager::{ConnectionManager, ManagerOptions};
use crate::request::{RequestClient, RequestOutcome};
use qyun_core::{DispatchRegistry, Endpoint, EventHandler};
use qyun_transport::{Connector, WebSocketConnector};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Channel messaging client bound to one server endpoint.
///
/// Bundles the one-shot request client, the send-role connection manager
/// and a listener sharing one dispatch registry.
#[derive(Debug)]
pub struct Client {
    endpoint: Endpoint,
    requests: RequestClient,
    manager: ConnectionManager,
    listener: Listener,
}

impl Client {
    /// Create a client using the WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let connector = Arc::new(WebSocketConnector::new(config.stream.websocket()));
        Self::with_connector(config, connector)
    }

    /// Create a client using a custom stream connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the HTTP client
    /// cannot be built.
    pub fn with_connector(
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ClientError> {
        let endpoint = config.endpoint()?;
        let requests = RequestClient::new(config.request.timeout())?;
        let registry = Arc::new(DispatchRegistry::new());

        let manager = ConnectionManager::new(
            Arc::clone(&connector),
            ManagerOptions {
                send_timeout: config.stream.send_timeout(),
                connect_timeout: config.stream.connect_timeout(),
            },
        );
        let listener = Listener::new(connector, registry, config.stream.connect_timeout());

        info!(endpoint = %endpoint, "Created channel client");

        Ok(Self {
            endpoint,
            requests,
            manager,
            listener,
        })
    }

    /// Get the server endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the send-role connection manager.
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Create a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn create_channel(&self, channel: &str) -> Result<RequestOutcome, RequestError> {
        self.requests.create_channel(&self.endpoint, channel).await
    }

    /// Send one message with a one-shot request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn send_message(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<RequestOutcome, RequestError> {
        self.requests
            .send_message(&self.endpoint, channel, message)
            .await
    }

    /// Send one message over the persistent stream connection.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::send`].
    pub async fn send_over_stream(
        &self,
        channel: &str,
        message: impl Into<String>,
    ) -> Result<(), SendError> {
        self.manager.send(&self.endpoint, channel, message).await
    }

    /// Replace the handler listeners dispatch events to.
    pub fn register_handler(&self, handler: impl EventHandler + 'static) {
        self.listener.registry().register(handler);
    }

    /// Listen on a channel until cancelled or the connection ends.
    ///
    /// # Errors
    ///
    /// See [`Listener::listen`].
    pub async fn listen(
        &self,
        channel: &str,
        cancel: CancellationToken,
    ) -> Result<ListenExit, ListenError> {
        self.listener.listen(&self.endpoint, channel, cancel).await
    }

    /// Close the send session, if any.
    pub async fn close(&self) {
        self.manager.close().await;
    }
}
