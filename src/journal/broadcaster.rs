//! In-process live notifier
//!
//! Keeps a registry of live handlers and invokes every one of them on each
//! published event. Journals call `publish` after an event is durable, so a
//! subscriber never hears about an event the store cannot return yet.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{LiveHandler, LiveNotifier, LiveSignal, SubscriptionId};
use crate::types::Event;

/// Event broadcaster for live query subscribers
pub struct Broadcaster {
    handlers: RwLock<HashMap<SubscriptionId, LiveHandler>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Notify every subscriber of an appended event
    pub fn publish(&self, event: &Event) {
        self.dispatch(LiveSignal::Appended(event.clone()));
    }

    /// Tell every subscriber the notification channel is broken
    pub fn fail(&self, reason: impl Into<String>) {
        self.dispatch(LiveSignal::Failed(reason.into()));
    }

    /// Number of active registrations
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    fn dispatch(&self, signal: LiveSignal) {
        // Clone the handlers out so a handler may unsubscribe without deadlocking
        let handlers: Vec<LiveHandler> = self.handlers.read().values().cloned().collect();
        for handler in handlers {
            handler(signal.clone());
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveNotifier for Broadcaster {
    fn subscribe(&self, handler: LiveHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.write().insert(id, handler);
        tracing::debug!(subscription = id.0, "live subscriber registered");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.handlers.write().remove(&id).is_some() {
            tracing::debug!(subscription = id.0, "live subscriber removed");
        }
    }
}
