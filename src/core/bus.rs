//! Payload-less "refresh now" signal

use super::observer::{Observers, Subscription};
use std::sync::Arc;
use tracing::debug;

pub type RefreshHandler = dyn Fn() + Send + Sync;

/// Fan-out signal used to request an immediate refresh. Delivery is
/// synchronous and at-most-once: a publish with no subscribers is lost.
#[derive(Default)]
pub struct RefreshBus {
    observers: Observers<RefreshHandler>,
}

impl RefreshBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Arc<RefreshHandler>) -> Subscription {
        self.observers.subscribe(handler)
    }

    /// Invokes every handler subscribed when the call starts, in
    /// subscription order.
    pub fn publish(&self) {
        let handlers = self.observers.snapshot();
        debug!(subscribers = handlers.len(), "Refresh requested");
        for handler in handlers {
            handler();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }
}
