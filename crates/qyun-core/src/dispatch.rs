//! Callback dispatch registry.
//!
//! The registry holds at most one application handler. Registration swaps
//! the handler atomically and the last registration wins; there is no way
//! to unregister. Events dispatched while no handler is registered go to
//! the fallback handler, a [`LoggingHandler`] unless configured otherwise.

use crate::event::{EventHandler, HandlerAction, LoggingHandler, StreamEvent};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type BoxedHandler = Box<dyn EventHandler>;

/// Routes listener events to the active handler.
pub struct DispatchRegistry {
    active: ArcSwapOption<BoxedHandler>,
    fallback: BoxedHandler,
}

impl DispatchRegistry {
    /// Create a registry that falls back to [`LoggingHandler`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(LoggingHandler)
    }

    /// Create a registry with a custom fallback handler.
    #[must_use]
    pub fn with_fallback(fallback: impl EventHandler + 'static) -> Self {
        Self {
            active: ArcSwapOption::empty(),
            fallback: Box::new(fallback),
        }
    }

    /// Replace the active handler.
    pub fn register(&self, handler: impl EventHandler + 'static) {
        let handler: BoxedHandler = Box::new(handler);
        if self.active.swap(Some(Arc::new(handler))).is_some() {
            debug!("Replaced registered event handler");
        } else {
            debug!("Registered event handler");
        }
    }

    /// Check whether an application handler is registered.
    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.active.load().is_some()
    }

    /// Deliver an event to the active handler, or the fallback.
    ///
    /// The handler's action is returned unchanged.
    pub fn dispatch(&self, event: &StreamEvent) -> HandlerAction {
        match self.active.load_full() {
            Some(handler) => handler.on_event(event),
            None => self.fallback.on_event(event),
        }
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("has_handler", &self.has_handler())
            .finish_non_exhaustive()
    }
}
