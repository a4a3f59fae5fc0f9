//! Notification config domain type.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::providers::{DeliveryPlan, ProviderType};
use crate::database::models::NotificationConfigDbModel;
use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::events::EventType;
use crate::secrets::SecretCipher;
use crate::{Error, Result};

/// A decrypted, parsed notification config.
#[derive(Clone, Serialize)]
pub struct NotificationConfig {
    pub id: String,
    pub name: String,
    pub provider: ProviderType,
    /// Provider parameters in plaintext. Never log.
    pub params: Value,
    /// Subscribed event type names.
    pub events: Vec<String>,
    pub enabled: bool,
    pub throttle_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating or updating a config.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfigInput {
    pub name: String,
    pub provider: ProviderType,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub throttle_seconds: u64,
}

fn default_enabled() -> bool {
    true
}

impl NotificationConfig {
    /// Minimum interval between two deliveries.
    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_seconds)
    }

    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.events.iter().any(|e| e == event_type)
    }

    pub fn delivery_plan(&self) -> Result<DeliveryPlan> {
        self.provider.delivery_plan(&self.params)
    }

    /// Decrypt and parse a stored row.
    pub fn from_db_model(model: &NotificationConfigDbModel, cipher: &SecretCipher) -> Result<Self> {
        let provider = ProviderType::parse(&model.provider_type)?;
        let plaintext = cipher.decrypt(&model.config)?;
        let params: Value = serde_json::from_str(&plaintext)?;
        let events: Vec<String> = serde_json::from_str(&model.events)?;

        Ok(Self {
            id: model.id.clone(),
            name: model.name.clone(),
            provider,
            params,
            events,
            enabled: model.enabled,
            throttle_seconds: model.throttle_seconds.max(0) as u64,
            created_at: ms_to_datetime(model.created_at),
            updated_at: ms_to_datetime(model.updated_at),
        })
    }

    /// Serialize and encrypt for storage.
    pub fn to_db_model(&self, cipher: &SecretCipher) -> Result<NotificationConfigDbModel> {
        let plaintext = serde_json::to_string(&self.params)?;
        Ok(NotificationConfigDbModel {
            id: self.id.clone(),
            name: self.name.clone(),
            provider_type: self.provider.as_str().to_string(),
            config: cipher.encrypt(&plaintext)?,
            events: serde_json::to_string(&self.events)?,
            enabled: self.enabled,
            throttle_seconds: i64::try_from(self.throttle_seconds).unwrap_or(i64::MAX),
            created_at: datetime_to_ms(self.created_at),
            updated_at: datetime_to_ms(self.updated_at),
        })
    }
}

impl NotificationConfigInput {
    /// Reject blank names, unknown event types and unusable parameters.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        for event in &self.events {
            match event.parse::<EventType>() {
                Ok(kind) if !kind.is_notification_outcome() => {}
                Ok(_) => {
                    return Err(Error::validation(format!(
                        "{} cannot be subscribed to",
                        event
                    )));
                }
                Err(_) => {
                    return Err(Error::validation(format!("unknown event type {}", event)));
                }
            }
        }
        self.provider.delivery_plan(&self.params)?;
        Ok(())
    }
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("events", &self.events)
            .field("enabled", &self.enabled)
            .field("throttle_seconds", &self.throttle_seconds)
            .finish_non_exhaustive()
    }
}
