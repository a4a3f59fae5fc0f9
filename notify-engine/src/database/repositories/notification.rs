//! Notification repository.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{NotificationConfigDbModel, NotificationLogDbModel};
use crate::database::retry::{retry_on_sqlite_busy, with_timeout};
use crate::{Error, Result};

/// Default per-operation timeout.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Notification repository trait.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    // Configs
    async fn get_config(&self, id: &str) -> Result<NotificationConfigDbModel>;
    async fn list_configs(&self) -> Result<Vec<NotificationConfigDbModel>>;
    async fn list_enabled_configs(&self) -> Result<Vec<NotificationConfigDbModel>>;
    async fn create_config(&self, config: &NotificationConfigDbModel) -> Result<()>;
    async fn update_config(&self, config: &NotificationConfigDbModel) -> Result<()>;
    async fn delete_config(&self, id: &str) -> Result<()>;

    // Delivery log
    async fn insert_log(&self, entry: &NotificationLogDbModel) -> Result<()>;
    async fn list_logs(&self, config_id: &str, limit: i64) -> Result<Vec<NotificationLogDbModel>>;
    async fn delete_logs_for_config(&self, config_id: &str) -> Result<u64>;
    /// Delete rows sent before `cutoff_ms`. Returns the number of rows removed.
    async fn delete_logs_before(&self, cutoff_ms: i64) -> Result<u64>;
    /// Keep only the `keep` most recently sent rows. Returns the number of rows removed.
    async fn trim_logs(&self, keep: i64) -> Result<u64>;
}

/// SQLx implementation of NotificationRepository.
pub struct SqlxNotificationRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqlxNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_timeout(pool, DEFAULT_STORE_TIMEOUT)
    }

    pub fn with_timeout(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn get_config(&self, id: &str) -> Result<NotificationConfigDbModel> {
        with_timeout("get_config", self.timeout, async {
            sqlx::query_as::<_, NotificationConfigDbModel>(
                "SELECT * FROM notification_config WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("NotificationConfig", id))
        })
        .await
    }

    async fn list_configs(&self) -> Result<Vec<NotificationConfigDbModel>> {
        with_timeout("list_configs", self.timeout, async {
            let configs = sqlx::query_as::<_, NotificationConfigDbModel>(
                "SELECT * FROM notification_config ORDER BY name",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(configs)
        })
        .await
    }

    async fn list_enabled_configs(&self) -> Result<Vec<NotificationConfigDbModel>> {
        with_timeout("list_enabled_configs", self.timeout, async {
            let configs = sqlx::query_as::<_, NotificationConfigDbModel>(
                "SELECT * FROM notification_config WHERE enabled = 1 ORDER BY name",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(configs)
        })
        .await
    }

    async fn create_config(&self, config: &NotificationConfigDbModel) -> Result<()> {
        with_timeout("create_config", self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO notification_config (
                    id, name, provider_type, config, events, enabled,
                    throttle_seconds, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&config.id)
            .bind(&config.name)
            .bind(&config.provider_type)
            .bind(&config.config)
            .bind(&config.events)
            .bind(config.enabled)
            .bind(config.throttle_seconds)
            .bind(config.created_at)
            .bind(config.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn update_config(&self, config: &NotificationConfigDbModel) -> Result<()> {
        with_timeout("update_config", self.timeout, async {
            let result = sqlx::query(
                r#"
                UPDATE notification_config SET
                    name = ?,
                    provider_type = ?,
                    config = ?,
                    events = ?,
                    enabled = ?,
                    throttle_seconds = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&config.name)
            .bind(&config.provider_type)
            .bind(&config.config)
            .bind(&config.events)
            .bind(config.enabled)
            .bind(config.throttle_seconds)
            .bind(config.updated_at)
            .bind(&config.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::not_found("NotificationConfig", &config.id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_config(&self, id: &str) -> Result<()> {
        with_timeout("delete_config", self.timeout, async {
            let result = sqlx::query("DELETE FROM notification_config WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(Error::not_found("NotificationConfig", id));
            }
            Ok(())
        })
        .await
    }

    async fn insert_log(&self, entry: &NotificationLogDbModel) -> Result<()> {
        let pool = &self.pool;
        with_timeout(
            "insert_log",
            self.timeout,
            retry_on_sqlite_busy("insert_log", move || async move {
                sqlx::query(
                    r#"
                    INSERT INTO notification_log (
                        id, notification_id, event_type, message, status, error, sent_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&entry.id)
                .bind(&entry.notification_id)
                .bind(&entry.event_type)
                .bind(&entry.message)
                .bind(&entry.status)
                .bind(&entry.error)
                .bind(entry.sent_at)
                .execute(pool)
                .await?;
                Ok(())
            }),
        )
        .await
    }

    async fn list_logs(&self, config_id: &str, limit: i64) -> Result<Vec<NotificationLogDbModel>> {
        with_timeout("list_logs", self.timeout, async {
            let entries = sqlx::query_as::<_, NotificationLogDbModel>(
                r#"
                SELECT * FROM notification_log
                WHERE notification_id = ?
                ORDER BY sent_at DESC, id DESC
                LIMIT ?
                "#,
            )
            .bind(config_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(entries)
        })
        .await
    }

    async fn delete_logs_for_config(&self, config_id: &str) -> Result<u64> {
        with_timeout("delete_logs_for_config", self.timeout, async {
            let result = sqlx::query("DELETE FROM notification_log WHERE notification_id = ?")
                .bind(config_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn delete_logs_before(&self, cutoff_ms: i64) -> Result<u64> {
        with_timeout("delete_logs_before", self.timeout, async {
            let result = sqlx::query("DELETE FROM notification_log WHERE sent_at < ?")
                .bind(cutoff_ms)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn trim_logs(&self, keep: i64) -> Result<u64> {
        with_timeout("trim_logs", self.timeout, async {
            let result = sqlx::query(
                r#"
                DELETE FROM notification_log
                WHERE id NOT IN (
                    SELECT id FROM notification_log
                    ORDER BY sent_at DESC, id DESC
                    LIMIT ?
                )
                "#,
            )
            .bind(keep)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
    }
}
