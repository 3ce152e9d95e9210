//! Server endpoint addressing.
//!
//! Endpoints are written as `host:port` and parsed once, at the edge.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing an endpoint string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// No `:` separates the host from the port.
    #[error("Endpoint '{0}' is missing a ':port' suffix")]
    MissingPort(String),

    /// The host part before the colon is empty.
    #[error("Endpoint '{0}' has an empty host")]
    EmptyHost(String),

    /// The port is not a positive integer in range.
    #[error("Endpoint '{0}' has an invalid port")]
    InvalidPort(String),
}

/// A channel server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the port is zero.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, EndpointError> {
        let host = host.into();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost(format!(":{port}")));
        }
        if port == 0 {
            return Err(EndpointError::InvalidPort(format!("{host}:{port}")));
        }
        Ok(Self { host, port })
    }

    /// Get the host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Value sent in the `Origin` header of stream handshakes.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split on the first colon only.
        let (host, port) = s
            .split_once(':')
            .ok_or_else(|| EndpointError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(EndpointError::EmptyHost(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| EndpointError::InvalidPort(s.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
