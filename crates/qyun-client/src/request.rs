//! One-shot request client.
//!
//! Creates channels and sends single messages with plain HTTP GET requests.
//! A request succeeds when it completes and the server answers with 200.

use crate::error::RequestError;
use crate::metrics;
use qyun_core::{channel, validate_channel_name, Endpoint};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    /// HTTP status code (always 200).
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// HTTP client for channel creation and one-shot sends.
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: reqwest::Client,
}

impl RequestClient {
    /// Create a request client with the given timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RequestError::Setup)?;
        Ok(Self { http })
    }

    /// Create a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn create_channel(
        &self,
        endpoint: &Endpoint,
        channel: &str,
    ) -> Result<RequestOutcome, RequestError> {
        validate_channel_name(channel).map_err(RequestError::InvalidChannel)?;
        self.get(endpoint, &channel::create_path(channel), "create")
            .await
    }

    /// Send a single message to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn send_message(
        &self,
        endpoint: &Endpoint,
        channel: &str,
        message: &str,
    ) -> Result<RequestOutcome, RequestError> {
        validate_channel_name(channel).map_err(RequestError::InvalidChannel)?;
        self.get(endpoint, &channel::send_path(channel, message), "send")
            .await
    }

    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        operation: &'static str,
    ) -> Result<RequestOutcome, RequestError> {
        let url = format!("http://{}{}", endpoint, path);
        debug!(url = %url, operation, "Sending request");

        let response = self.http.get(&url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request failed");
            metrics::record_request(operation, "error");
            RequestError::Transport(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            metrics::record_request(operation, "error");
            RequestError::Transport(e)
        })?;

        if status != 200 {
            warn!(url = %url, status, body = %body, "Request rejected");
            metrics::record_request(operation, "rejected");
            return Err(RequestError::Status { status, body });
        }

        metrics::record_request(operation, "ok");
        Ok(RequestOutcome { status, body })
    }
}
