//! Repository layer.

pub mod notification;

pub use notification::{NotificationRepository, SqlxNotificationRepository};
