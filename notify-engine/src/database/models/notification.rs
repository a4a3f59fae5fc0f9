//! Notification database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::now_ms;

/// Notification config database model.
/// Represents one configured delivery target.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationConfigDbModel {
    pub id: String,
    pub name: String,
    /// Provider wire name (e.g. `discord`, `generic`).
    pub provider_type: String,
    /// Provider parameters as JSON, encrypted (`enc:v1:`) or legacy plaintext.
    pub config: String,
    /// JSON array of subscribed event type names.
    pub events: String,
    pub enabled: bool,
    pub throttle_seconds: i64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Notification log database model.
/// One row per attempted delivery.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationLogDbModel {
    pub id: String,
    /// Config the delivery was made for. The config may since have been deleted.
    pub notification_id: String,
    pub event_type: String,
    pub message: String,
    /// `sent` or `failed`.
    pub status: String,
    /// Empty on success.
    pub error: String,
    /// Unix epoch milliseconds.
    pub sent_at: i64,
}

impl NotificationLogDbModel {
    pub fn new(
        notification_id: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
        status: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            notification_id: notification_id.into(),
            event_type: event_type.into(),
            message: message.into(),
            status: status.into(),
            error: error.into(),
            sent_at: now_ms(),
        }
    }
}
