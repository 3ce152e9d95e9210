//! # qyun-core
//!
//! Core types for the Qyun channel messaging client.
//!
//! This crate provides the building blocks shared by the transport and
//! client crates:
//!
//! - **Endpoint** - `host:port` address of a channel server
//! - **Channel** - Channel name validation and route construction
//! - **Event** - Stream events and the `EventHandler` trait
//! - **Dispatch** - Registry routing listener events to the active handler
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  Listener   │────▶│  Dispatch   │────▶│ EventHandler │
//! └─────────────┘     │  Registry   │     └──────────────┘
//!                     └─────────────┘
//!                            │ (no handler registered)
//!                            ▼
//!                     ┌──────────────┐
//!                     │LoggingHandler│
//!                     └──────────────┘
//! ```

pub mod channel;
pub mod dispatch;
pub mod endpoint;
pub mod event;

pub use channel::{validate_channel_name, ChannelId};
pub use dispatch::DispatchRegistry;
pub use endpoint::{Endpoint, EndpointError};
pub use event::{EventHandler, HandlerAction, LoggingHandler, StreamEvent};
