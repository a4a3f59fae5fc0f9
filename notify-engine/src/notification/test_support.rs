//! In-memory collaborators for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::transport::Transport;
use crate::database::models::{NotificationConfigDbModel, NotificationLogDbModel};
use crate::database::repositories::NotificationRepository;
use crate::{Error, Result};

#[derive(Default)]
pub struct MockRepository {
    configs: Mutex<Vec<NotificationConfigDbModel>>,
    logs: Mutex<Vec<NotificationLogDbModel>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    /// One-shot pause applied after the next enabled-config read.
    list_delay: Mutex<Option<Duration>>,
}

impl MockRepository {
    pub fn with_configs(configs: Vec<NotificationConfigDbModel>) -> Self {
        Self {
            configs: Mutex::new(configs),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn delay_next_list(&self, delay: Duration) {
        *self.list_delay.lock() = Some(delay);
    }

    pub fn logs(&self) -> Vec<NotificationLogDbModel> {
        self.logs.lock().clone()
    }

    pub fn configs(&self) -> Vec<NotificationConfigDbModel> {
        self.configs.lock().clone()
    }

    pub fn push_log(&self, config_id: &str, sent_at: i64) {
        let mut row = NotificationLogDbModel::new(config_id, "ScanCompleted", "m", "sent", "");
        row.sent_at = sent_at;
        self.logs.lock().push(row);
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Other("store unavailable".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Other("store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MockRepository {
    async fn get_config(&self, id: &str) -> Result<NotificationConfigDbModel> {
        self.check_read()?;
        self.configs
            .lock()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("NotificationConfig", id))
    }

    async fn list_configs(&self) -> Result<Vec<NotificationConfigDbModel>> {
        self.check_read()?;
        Ok(self.configs.lock().clone())
    }

    async fn list_enabled_configs(&self) -> Result<Vec<NotificationConfigDbModel>> {
        self.check_read()?;
        let rows: Vec<_> = self
            .configs
            .lock()
            .iter()
            .filter(|c| c.enabled)
            .cloned()
            .collect();
        let delay = self.list_delay.lock().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(rows)
    }

    async fn create_config(&self, config: &NotificationConfigDbModel) -> Result<()> {
        self.check_write()?;
        self.configs.lock().push(config.clone());
        Ok(())
    }

    async fn update_config(&self, config: &NotificationConfigDbModel) -> Result<()> {
        self.check_write()?;
        let mut configs = self.configs.lock();
        let slot = configs
            .iter_mut()
            .find(|c| c.id == config.id)
            .ok_or_else(|| Error::not_found("NotificationConfig", &config.id))?;
        *slot = config.clone();
        Ok(())
    }

    async fn delete_config(&self, id: &str) -> Result<()> {
        self.check_write()?;
        let mut configs = self.configs.lock();
        let before = configs.len();
        configs.retain(|c| c.id != id);
        if configs.len() == before {
            return Err(Error::not_found("NotificationConfig", id));
        }
        Ok(())
    }

    async fn insert_log(&self, entry: &NotificationLogDbModel) -> Result<()> {
        self.check_write()?;
        self.logs.lock().push(entry.clone());
        Ok(())
    }

    async fn list_logs(&self, config_id: &str, limit: i64) -> Result<Vec<NotificationLogDbModel>> {
        self.check_read()?;
        let mut rows: Vec<_> = self
            .logs
            .lock()
            .iter()
            .filter(|l| l.notification_id == config_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn delete_logs_for_config(&self, config_id: &str) -> Result<u64> {
        self.check_write()?;
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.retain(|l| l.notification_id != config_id);
        Ok((before - logs.len()) as u64)
    }

    async fn delete_logs_before(&self, cutoff_ms: i64) -> Result<u64> {
        self.check_write()?;
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.retain(|l| l.sent_at >= cutoff_ms);
        Ok((before - logs.len()) as u64)
    }

    async fn trim_logs(&self, keep: i64) -> Result<u64> {
        self.check_write()?;
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        logs.truncate(keep.max(0) as usize);
        Ok((before - logs.len()) as u64)
    }
}

/// A message captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub descriptor: String,
    pub title: String,
    pub message: String,
}

#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    /// Descriptors containing this substring fail.
    fail_matching: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn fail_when_contains(&self, needle: &str) {
        *self.fail_matching.lock() = Some(needle.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, descriptor: &str, title: &str, message: &str) -> Result<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail = self
            .fail_matching
            .lock()
            .as_deref()
            .is_some_and(|needle| descriptor.contains(needle));
        if fail {
            return Err(Error::transport("destination rejected the message"));
        }

        self.sent.lock().push(SentMessage {
            descriptor: descriptor.to_string(),
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
