//! Best-effort delivery audit trail.
//!
//! Nothing in here returns an error: store failures are logged and the
//! dispatch path carries on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::models::NotificationLogDbModel;
use crate::database::repositories::NotificationRepository;
use crate::database::time::{datetime_to_ms, ms_to_datetime};

/// Outcome of one delivery attempt.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// One audit row as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryLogEntry {
    pub id: String,
    pub config_id: String,
    pub event_type: String,
    pub message: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl From<NotificationLogDbModel> for DeliveryLogEntry {
    fn from(row: NotificationLogDbModel) -> Self {
        Self {
            status: row.status.parse().unwrap_or(DeliveryStatus::Failed),
            error: (!row.error.is_empty()).then_some(row.error),
            sent_at: ms_to_datetime(row.sent_at),
            id: row.id,
            config_id: row.notification_id,
            event_type: row.event_type,
            message: row.message,
        }
    }
}

/// Bounds applied by [`DeliveryAuditLog::retention_sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    pub max_rows: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            max_rows: 100,
        }
    }
}

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: u64,
    pub trimmed: u64,
}

pub struct DeliveryAuditLog {
    repo: Arc<dyn NotificationRepository>,
    policy: RetentionPolicy,
}

impl DeliveryAuditLog {
    pub fn new(repo: Arc<dyn NotificationRepository>, policy: RetentionPolicy) -> Self {
        Self { repo, policy }
    }

    /// Append one row.
    pub async fn record(
        &self,
        config_id: &str,
        event_type: &str,
        message: &str,
        status: DeliveryStatus,
        error: Option<&str>,
    ) {
        let row = NotificationLogDbModel::new(
            config_id,
            event_type,
            message,
            <&'static str>::from(status),
            error.unwrap_or_default(),
        );
        if let Err(e) = self.repo.insert_log(&row).await {
            warn!(
                config_id = %config_id,
                event_type = %event_type,
                error = %e,
                "Failed to write notification audit row"
            );
        }
    }

    /// Delete rows older than the age bound, then keep only the newest rows.
    ///
    /// A failed step is logged and leaves its rows for the next sweep.
    pub async fn retention_sweep(&self) -> SweepReport {
        self.retention_sweep_at(Utc::now()).await
    }

    pub(crate) async fn retention_sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let max_age = chrono::Duration::from_std(self.policy.max_age)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let cutoff = datetime_to_ms(now - max_age);
        match self.repo.delete_logs_before(cutoff).await {
            Ok(n) => report.expired = n,
            Err(e) => warn!(error = %e, "Failed to delete expired notification audit rows"),
        }

        match self.repo.trim_logs(i64::from(self.policy.max_rows)).await {
            Ok(n) => report.trimmed = n,
            Err(e) => warn!(error = %e, "Failed to trim notification audit rows"),
        }

        if report.expired + report.trimmed > 0 {
            info!(
                expired = report.expired,
                trimmed = report.trimmed,
                "Notification audit retention sweep"
            );
        } else {
            debug!("Notification audit retention sweep removed nothing");
        }
        report
    }

    /// Most recent rows for `config_id`, newest first. Empty on store failure.
    pub async fn list(&self, config_id: &str, limit: u32) -> Vec<DeliveryLogEntry> {
        match self.repo.list_logs(config_id, i64::from(limit)).await {
            Ok(rows) => rows.into_iter().map(DeliveryLogEntry::from).collect(),
            Err(e) => {
                warn!(config_id = %config_id, error = %e, "Failed to read notification audit rows");
                Vec::new()
            }
        }
    }

    /// Remove every row for `config_id`.
    pub async fn purge_config(&self, config_id: &str) {
        match self.repo.delete_logs_for_config(config_id).await {
            Ok(n) => debug!(config_id = %config_id, removed = n, "Purged notification audit rows"),
            Err(e) => {
                warn!(config_id = %config_id, error = %e, "Failed to purge notification audit rows")
            }
        }
    }
}
