//! In-memory set of enabled notification configs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::config::NotificationConfig;
use crate::Result;
use crate::database::repositories::NotificationRepository;
use crate::secrets::SecretCipher;

/// Enabled configs keyed by id, swapped wholesale on reload.
#[derive(Debug, Default)]
pub struct ConfigCache {
    configs: RwLock<HashMap<String, Arc<NotificationConfig>>>,
    /// Held from the store read until the swap so reloads apply in order.
    reload_lock: tokio::sync::Mutex<()>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the enabled rows in the store.
    ///
    /// Rows that fail to decrypt or parse are logged and left out; only a
    /// store failure aborts the reload, leaving the previous set in place.
    /// Returns the number of configs loaded.
    pub async fn reload(
        &self,
        repo: &dyn NotificationRepository,
        cipher: &SecretCipher,
    ) -> Result<usize> {
        let _serial = self.reload_lock.lock().await;
        let rows = repo.list_enabled_configs().await?;

        let mut next = HashMap::with_capacity(rows.len());
        for row in &rows {
            match NotificationConfig::from_db_model(row, cipher) {
                Ok(config) => {
                    next.insert(config.id.clone(), Arc::new(config));
                }
                Err(e) => {
                    warn!(
                        config_id = %row.id,
                        provider = %row.provider_type,
                        error = %e,
                        "Skipping notification config that failed to load"
                    );
                }
            }
        }

        let loaded = next.len();
        *self.configs.write() = next;
        debug!(loaded, skipped = rows.len() - loaded, "Notification configs reloaded");
        Ok(loaded)
    }

    /// Enabled configs subscribed to `event_type`.
    pub fn matching(&self, event_type: &str) -> Vec<Arc<NotificationConfig>> {
        self.configs
            .read()
            .values()
            .filter(|c| c.enabled && c.subscribes_to(event_type))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<NotificationConfig>> {
        self.configs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
