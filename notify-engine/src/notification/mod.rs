//! Notification engine module.
//!
//! Turns domain events into deliveries over one of the supported providers
//! (chat webhooks, push services, email, generic webhooks), with per-config
//! throttling and a bounded delivery audit trail.
//!
//! # Example
//!
//! ```ignore
//! use notify_engine::notification::{HttpTransport, NotificationEngine, NotificationEngineConfig};
//!
//! let transport = Arc::new(HttpTransport::new(Duration::from_secs(30))?);
//! let engine = NotificationEngine::new(
//!     NotificationEngineConfig::default(),
//!     repo,
//!     bus,
//!     transport,
//!     cipher,
//! )?;
//! engine.start().await?;
//! ```

pub mod audit;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod formatter;
pub mod providers;
pub mod service;
pub mod throttle;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use audit::{DeliveryLogEntry, DeliveryStatus, RetentionPolicy, SweepReport};
pub use config::{NotificationConfig, NotificationConfigInput};
pub use providers::{DeliveryPlan, ProviderType, WebhookTarget};
pub use service::{EngineStats, NotificationEngine, NotificationEngineConfig, correlation_key};
pub use transport::{HttpTransport, Transport};
