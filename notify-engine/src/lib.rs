//! notify-engine library crate.
//!
//! Event-driven notification dispatch: encrypted provider configs, per-config
//! throttling, provider descriptor building and a bounded delivery audit log.

pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod notification;
pub mod secrets;
pub mod utils;

pub use error::{Error, Result};
