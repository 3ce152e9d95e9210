//! # qyun-client
//!
//! Client for the Qyun channel messaging service.
//!
//! Three operations are exposed:
//!
//! - **Create** - create a named channel with a one-shot request
//! - **Send** - send a message with a one-shot request, or over a
//!   persistent stream connection that is reused per `(endpoint, channel)`
//! - **Listen** - receive an unbounded sequence of messages on a channel,
//!   dispatched to a registered [`EventHandler`](qyun_core::EventHandler)
//!
//! ## Example
//!
//! ```rust,no_run
//! use qyun_client::{Client, ClientConfig};
//! use qyun_core::{HandlerAction, StreamEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = Client::new(&ClientConfig::default())?;
//! client.create_channel("test").await?;
//!
//! client.register_handler(|event: &StreamEvent| {
//!     if let Some(payload) = event.payload() {
//!         println!("{}", String::from_utf8_lossy(payload));
//!     }
//!     HandlerAction::Continue
//! });
//!
//! let cancel = CancellationToken::new();
//! client.send_over_stream("test", "Hello, World!").await?;
//! client.listen("test", cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod listener;
pub mod manager;
pub mod metrics;
pub mod request;

#[cfg(test)]
mod testing;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, ListenError, RequestError, SendError};
pub use listener::{ListenExit, Listener};
pub use manager::{ConnectionManager, ManagerOptions, SessionTarget};
pub use request::{RequestClient, RequestOutcome};
