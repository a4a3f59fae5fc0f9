//! Process settings loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::notification::{NotificationEngineConfig, RetentionPolicy};
use crate::{Error, Result};

/// Runtime settings for the engine binary.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub database_url: String,
    /// Key material for config encryption. Unset disables encryption.
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
    pub log_dir: String,
    pub sweep_interval_secs: u64,
    pub audit_max_age_days: u64,
    pub audit_max_rows: u32,
    pub http_timeout_secs: u64,
    pub store_timeout_secs: u64,
    /// Label stamped on direct webhook bodies.
    pub source: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:notify.db?mode=rwc".to_string(),
            encryption_key: None,
            log_dir: "logs".to_string(),
            sweep_interval_secs: 3600,
            audit_max_age_days: 7,
            audit_max_rows: 100,
            http_timeout_secs: 30,
            store_timeout_secs: 10,
            source: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl std::fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSettings")
            .field("database_url", &self.database_url)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .field("log_dir", &self.log_dir)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("audit_max_age_days", &self.audit_max_age_days)
            .field("audit_max_rows", &self.audit_max_rows)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("source", &self.source)
            .finish()
    }
}

impl EngineSettings {
    /// Load settings from the process environment, reading `.env` first.
    ///
    /// Supported env vars:
    /// - `DATABASE_URL`
    /// - `NOTIFY_ENCRYPTION_KEY`
    /// - `NOTIFY_LOG_DIR`
    /// - `NOTIFY_SWEEP_INTERVAL_SECS`
    /// - `NOTIFY_AUDIT_MAX_AGE_DAYS`
    /// - `NOTIFY_AUDIT_MAX_ROWS`
    /// - `NOTIFY_HTTP_TIMEOUT_SECS`
    /// - `NOTIFY_STORE_TIMEOUT_SECS`
    /// - `NOTIFY_SOURCE`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut settings = Self::default();

        if let Some(v) = get("DATABASE_URL") {
            settings.database_url = v;
        }
        settings.encryption_key = get("NOTIFY_ENCRYPTION_KEY");
        if let Some(v) = get("NOTIFY_LOG_DIR") {
            settings.log_dir = v;
        }
        if let Some(v) = get("NOTIFY_SOURCE") {
            settings.source = v;
        }

        parse_into(&get, "NOTIFY_SWEEP_INTERVAL_SECS", &mut settings.sweep_interval_secs)?;
        parse_into(&get, "NOTIFY_AUDIT_MAX_AGE_DAYS", &mut settings.audit_max_age_days)?;
        parse_into(&get, "NOTIFY_AUDIT_MAX_ROWS", &mut settings.audit_max_rows)?;
        parse_into(&get, "NOTIFY_HTTP_TIMEOUT_SECS", &mut settings.http_timeout_secs)?;
        parse_into(&get, "NOTIFY_STORE_TIMEOUT_SECS", &mut settings.store_timeout_secs)?;

        if settings.sweep_interval_secs == 0 {
            return Err(Error::config("NOTIFY_SWEEP_INTERVAL_SECS must be positive"));
        }
        Ok(settings)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn engine_config(&self) -> NotificationEngineConfig {
        NotificationEngineConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            retention: RetentionPolicy {
                max_age: Duration::from_secs(self.audit_max_age_days * 24 * 60 * 60),
                max_rows: self.audit_max_rows,
            },
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            source: self.source.clone(),
        }
    }
}

fn parse_into<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = raw
            .parse()
            .map_err(|_| Error::config(format!("{} must be a non-negative integer, got {:?}", key, raw)))?;
    }
    Ok(())
}
