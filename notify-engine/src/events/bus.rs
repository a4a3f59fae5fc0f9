//! Event bus abstraction and an in-process implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::DomainEvent;
use crate::Result;

/// Callback invoked once per published event of the subscribed type.
///
/// Handlers run on the publisher's task and must not block; long work should
/// be spawned.
pub type EventHandler = Arc<dyn Fn(DomainEvent) + Send + Sync>;

/// Publish/subscribe collaborator.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Register `handler` for events whose `event_type` equals `event_type`.
    fn subscribe(&self, event_type: &str, handler: EventHandler);

    /// Deliver `event` to every handler subscribed to its type.
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

/// Event bus that dispatches to in-process handlers.
#[derive(Default)]
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers registered for `event_type`.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: EventHandler) {
        self.handlers
            .write()
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    async fn publish(&self, event: DomainEvent) -> Result<()> {
        // Snapshot so handlers may subscribe or publish without deadlocking.
        let handlers = self
            .handlers
            .read()
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        trace!(
            event_type = %event.event_type,
            handlers = handlers.len(),
            "Publishing event"
        );

        for handler in handlers {
            handler(event.clone());
        }
        Ok(())
    }
}
