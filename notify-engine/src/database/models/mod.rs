//! Database models.

mod notification;

pub use notification::{NotificationConfigDbModel, NotificationLogDbModel};
