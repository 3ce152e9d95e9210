//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (QYUN_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use qyun_core::{Endpoint, EndpointError};
use qyun_transport::WebSocketConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Interval of one service tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Number of service ticks a send waits for.
pub const DEFAULT_TICK_COUNT: u32 = 100;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Channel server as `host:port`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Stream connection configuration.
    #[serde(default)]
    pub stream: StreamConfig,

    /// One-shot request configuration.
    #[serde(default)]
    pub request: RequestConfig,
}

/// Stream connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Interval of one service tick, in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Number of ticks a stream send waits for.
    #[serde(default = "default_tick_count")]
    pub tick_count: u32,

    /// Send budget in milliseconds. Overrides the tick budget when set.
    #[serde(default = "default_send_timeout", skip_serializing_if = "Option::is_none")]
    pub send_timeout_ms: Option<u64>,

    /// How long opening a stream connection may take, in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Announce the role subprotocol during the handshake.
    #[serde(default)]
    pub announce_subprotocol: bool,
}

/// One-shot request configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_ms: u64,
}

/// Total wait of `count` ticks of `interval` each.
#[must_use]
pub fn tick_budget(interval: Duration, count: u32) -> Duration {
    interval.saturating_mul(count)
}

// Default value functions
fn default_endpoint() -> String {
    std::env::var("QYUN_ENDPOINT").unwrap_or_else(|_| "localhost:8000".to_string())
}

fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}

fn default_tick_count() -> u32 {
    DEFAULT_TICK_COUNT
}

fn default_send_timeout() -> Option<u64> {
    std::env::var("QYUN_SEND_TIMEOUT_MS")
        .ok()
        .and_then(|t| t.parse().ok())
}

fn default_connect_timeout() -> u64 {
    5_000 // 5 seconds
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_request_timeout() -> u64 {
    10_000 // 10 seconds
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            stream: StreamConfig::default(),
            request: RequestConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            tick_count: default_tick_count(),
            send_timeout_ms: default_send_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            max_message_size: default_max_message_size(),
            announce_subprotocol: false,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_request_timeout(),
        }
    }
}

impl StreamConfig {
    /// Send budget: `send_timeout_ms` if set, else `tick_count` ticks of
    /// `tick_interval_ms` (10 seconds by default).
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        match self.send_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => tick_budget(Duration::from_millis(self.tick_interval_ms), self.tick_count),
        }
    }

    /// Connect timeout as a duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Settings for the WebSocket connector.
    #[must_use]
    pub fn websocket(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: self.max_message_size,
            announce_subprotocol: self.announce_subprotocol,
        }
    }
}

impl RequestConfig {
    /// Request timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ClientConfig {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "qyun.toml",
            "/etc/qyun/qyun.toml",
            "~/.config/qyun/qyun.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not `host:port`.
    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        self.endpoint.parse()
    }
}
