//! Domain events consumed and produced by the notification engine.

mod bus;
mod catalog;

pub use bus::{EventBus, EventHandler, InMemoryEventBus};
pub use catalog::{EventCategory, EventType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event payload: string keys mapped to scalar JSON values.
pub type EventData = Map<String, Value>;

/// Aggregate type stamped on correlation events.
pub const CORRUPTION_AGGREGATE: &str = "corruption";

/// An event travelling over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainEvent {
    #[serde(default)]
    pub aggregate_type: String,
    #[serde(default)]
    pub aggregate_id: String,
    pub event_type: String,
    #[serde(default)]
    pub event_data: EventData,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        event_data: EventData,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            event_data,
            created_at: Utc::now(),
        }
    }

    /// Catalog entry for this event, if the type is known.
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }
}
