//! Notification engine.
//!
//! Subscribes to the event bus, matches each event against the enabled
//! configs, and delivers to every match on its own task. A single background
//! worker handles coalesced reload requests and the audit retention sweep.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::audit::{DeliveryAuditLog, DeliveryLogEntry, DeliveryStatus, RetentionPolicy, SweepReport};
use super::cache::ConfigCache;
use super::config::{NotificationConfig, NotificationConfigInput};
use super::dispatch::{Dispatcher, OutgoingMessage};
use super::formatter::{self, EventFields, TEST_MESSAGE, TEST_TITLE};
use super::throttle::ThrottleGate;
use super::transport::Transport;
use crate::database::repositories::NotificationRepository;
use crate::events::{CORRUPTION_AGGREGATE, DomainEvent, EventBus, EventData, EventType};
use crate::secrets::SecretCipher;
use crate::utils::http_client::build_client;
use crate::{Error, Result};

/// Event type stamped on test deliveries.
const TEST_EVENT_TYPE: &str = "Test";

/// Event-data keys that may carry a correlation id.
const CORRELATION_KEYS: [&str; 2] = ["aggregate_id", "corruption_id"];

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct NotificationEngineConfig {
    /// Interval between audit retention sweeps.
    pub sweep_interval: Duration,
    pub retention: RetentionPolicy,
    /// Bound on each outbound HTTP request.
    pub http_timeout: Duration,
    /// Label placed in direct webhook bodies.
    pub source: String,
}

impl Default for NotificationEngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60 * 60),
            retention: RetentionPolicy::default(),
            http_timeout: Duration::from_secs(30),
            source: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Point-in-time engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Enabled configs currently loaded.
    pub config_count: usize,
    /// Deliveries still running.
    pub in_flight: usize,
    /// Configs with a recorded send.
    pub throttled_configs: usize,
}

pub struct NotificationEngine {
    config: NotificationEngineConfig,
    repo: Arc<dyn NotificationRepository>,
    bus: Arc<dyn EventBus>,
    cipher: SecretCipher,
    dispatcher: Dispatcher,
    cache: ConfigCache,
    throttle: ThrottleGate,
    audit: DeliveryAuditLog,
    reload_tx: mpsc::Sender<()>,
    reload_rx: Mutex<Option<mpsc::Receiver<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl NotificationEngine {
    pub fn new(
        config: NotificationEngineConfig,
        repo: Arc<dyn NotificationRepository>,
        bus: Arc<dyn EventBus>,
        transport: Arc<dyn Transport>,
        cipher: SecretCipher,
    ) -> Result<Arc<Self>> {
        let client = build_client(config.http_timeout)?;
        let (reload_tx, reload_rx) = mpsc::channel(1);

        Ok(Arc::new(Self {
            dispatcher: Dispatcher::new(transport, client, config.source.clone()),
            audit: DeliveryAuditLog::new(repo.clone(), config.retention),
            cache: ConfigCache::new(),
            throttle: ThrottleGate::new(),
            reload_tx,
            reload_rx: Mutex::new(Some(reload_rx)),
            worker: Mutex::new(None),
            tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
            config,
            repo,
            bus,
            cipher,
        }))
    }

    /// Load configs, subscribe to the bus and launch the background worker.
    ///
    /// Fails if the initial load fails or the engine was already started.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let Some(reload_rx) = self.reload_rx.lock().take() else {
            return Err(Error::Other("notification engine already started".into()));
        };

        let loaded = match self.reload_now().await {
            Ok(n) => n,
            Err(e) => {
                *self.reload_rx.lock() = Some(reload_rx);
                return Err(e);
            }
        };

        let mut subscribed = 0usize;
        for event_type in EventType::notifiable() {
            let engine: Weak<Self> = Arc::downgrade(self);
            self.bus.subscribe(
                event_type.as_str(),
                Arc::new(move |event: DomainEvent| {
                    if let Some(engine) = engine.upgrade() {
                        engine.handle_event(event);
                    }
                }),
            );
            subscribed += 1;
        }

        let engine = self.clone();
        *self.worker.lock() = Some(tokio::spawn(async move {
            engine.run_worker(reload_rx).await;
        }));

        info!(
            configs = loaded,
            event_types = subscribed,
            "Notification engine started"
        );
        Ok(())
    }

    /// Stop the worker and wait for it and for in-flight deliveries.
    pub async fn stop(&self) {
        info!("Stopping notification engine");
        self.cancellation_token.cancel();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            error!(error = %e, "Notification worker terminated abnormally");
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("Notification engine stopped");
    }

    async fn run_worker(&self, mut reload_rx: mpsc::Receiver<()>) {
        let period = self.config.sweep_interval.max(Duration::from_secs(1));
        let mut sweep = interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    debug!("Notification worker shutting down");
                    break;
                }
                Some(()) = reload_rx.recv() => {
                    if let Err(e) = self.reload_now().await {
                        warn!(error = %e, "Failed to reload notification configs");
                    }
                }
                _ = sweep.tick() => {
                    self.audit.retention_sweep().await;
                }
            }
        }
    }

    /// Match an inbound event and launch one delivery per eligible config.
    fn handle_event(self: Arc<Self>, event: DomainEvent) {
        if self.cancellation_token.is_cancelled() {
            return;
        }

        for config in self.cache.matching(&event.event_type) {
            if !self.throttle.try_acquire(&config.id, config.throttle()) {
                debug!(
                    config_id = %config.id,
                    event_type = %event.event_type,
                    "Notification throttled"
                );
                continue;
            }

            let engine = self.clone();
            let event = event.clone();
            self.tracker.spawn(async move {
                engine.deliver(&config, &event).await;
            });
        }
    }

    async fn deliver(&self, config: &NotificationConfig, event: &DomainEvent) {
        let fields = EventFields::from_data(&event.event_data);
        let title = formatter::title(&event.event_type, &fields.file_name);
        let message = formatter::format(&event.event_type, &fields);
        let msg = OutgoingMessage {
            event_type: &event.event_type,
            title: &title,
            message: &message,
            fields: &fields,
            timestamp: event.created_at,
        };

        let result = match config.delivery_plan() {
            Ok(plan) => self.dispatcher.deliver(&plan, &msg).await,
            Err(e) => Err(e),
        };

        let error_text = result.as_ref().err().map(ToString::to_string);
        match &error_text {
            None => info!(
                config_id = %config.id,
                provider = %config.provider,
                event_type = %event.event_type,
                "Notification sent"
            ),
            Some(e) => warn!(
                config_id = %config.id,
                provider = %config.provider,
                event_type = %event.event_type,
                error = %e,
                "Notification failed"
            ),
        }

        let status = if error_text.is_none() {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        };
        self.audit
            .record(
                &config.id,
                &event.event_type,
                &message,
                status,
                error_text.as_deref(),
            )
            .await;

        if let Some(key) = correlation_key(&event.event_data) {
            let outcome = outcome_event(key, config, &event.event_type, error_text.as_deref());
            if let Err(e) = self.bus.publish(outcome).await {
                warn!(
                    config_id = %config.id,
                    error = %e,
                    "Failed to publish notification outcome event"
                );
            }
        }
    }

    async fn reload_now(&self) -> Result<usize> {
        self.cache.reload(self.repo.as_ref(), &self.cipher).await
    }

    /// Request a config reload. Requests made while one is pending are merged.
    pub fn reload_configs(&self) {
        match self.reload_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("Reload requested after the notification worker exited");
            }
        }
    }

    async fn reload_after_mutation(&self) {
        if let Err(e) = self.reload_now().await {
            warn!(error = %e, "Failed to reload notification configs after change");
        }
    }

    /// Every stored config, decrypted. Rows that fail to load are skipped.
    pub async fn list_configs(&self) -> Result<Vec<NotificationConfig>> {
        let rows = self.repo.list_configs().await?;
        Ok(rows
            .iter()
            .filter_map(
                |row| match NotificationConfig::from_db_model(row, &self.cipher) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!(config_id = %row.id, error = %e, "Skipping unreadable notification config");
                        None
                    }
                },
            )
            .collect())
    }

    pub async fn get_config(&self, id: &str) -> Result<NotificationConfig> {
        let row = self.repo.get_config(id).await?;
        NotificationConfig::from_db_model(&row, &self.cipher)
    }

    /// Validate, encrypt and store a new config.
    pub async fn create_config(&self, input: NotificationConfigInput) -> Result<NotificationConfig> {
        input.validate()?;

        let now = Utc::now();
        let config = NotificationConfig {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            provider: input.provider,
            params: input.params,
            events: input.events,
            enabled: input.enabled,
            throttle_seconds: input.throttle_seconds,
            created_at: now,
            updated_at: now,
        };
        self.repo
            .create_config(&config.to_db_model(&self.cipher)?)
            .await?;

        info!(config_id = %config.id, provider = %config.provider, "Notification config created");
        self.reload_after_mutation().await;
        Ok(config)
    }

    /// Replace the fields of an existing config.
    pub async fn update_config(
        &self,
        id: &str,
        input: NotificationConfigInput,
    ) -> Result<NotificationConfig> {
        input.validate()?;

        let existing = self.repo.get_config(id).await?;
        let config = NotificationConfig {
            id: existing.id,
            name: input.name.trim().to_string(),
            provider: input.provider,
            params: input.params,
            events: input.events,
            enabled: input.enabled,
            throttle_seconds: input.throttle_seconds,
            created_at: crate::database::time::ms_to_datetime(existing.created_at),
            updated_at: Utc::now(),
        };
        self.repo
            .update_config(&config.to_db_model(&self.cipher)?)
            .await?;

        info!(config_id = %config.id, "Notification config updated");
        self.reload_after_mutation().await;
        Ok(config)
    }

    /// Delete a config along with its audit rows and throttle state.
    pub async fn delete_config(&self, id: &str) -> Result<()> {
        self.repo.delete_config(id).await?;
        self.audit.purge_config(id).await;
        self.throttle.forget(id);

        info!(config_id = %id, "Notification config deleted");
        self.reload_after_mutation().await;
        Ok(())
    }

    /// Deliver a fixed test message to `config`, bypassing throttle and audit.
    pub async fn send_test(&self, config: &NotificationConfig) -> Result<()> {
        let plan = config.delivery_plan()?;
        let fields = EventFields::default();
        let msg = OutgoingMessage {
            event_type: TEST_EVENT_TYPE,
            title: TEST_TITLE,
            message: TEST_MESSAGE,
            fields: &fields,
            timestamp: Utc::now(),
        };
        self.dispatcher.deliver(&plan, &msg).await
    }

    /// Most recent audit rows for `config_id`, newest first.
    pub async fn get_delivery_log(&self, config_id: &str, limit: u32) -> Vec<DeliveryLogEntry> {
        self.audit.list(config_id, limit).await
    }

    /// Run a retention sweep now.
    pub async fn run_retention_sweep(&self) -> SweepReport {
        self.audit.retention_sweep().await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            config_count: self.cache.len(),
            in_flight: self.tracker.len(),
            throttled_configs: self.throttle.len(),
        }
    }
}

/// UUID-shaped `aggregate_id` or `corruption_id` from event data.
pub fn correlation_key(data: &EventData) -> Option<Uuid> {
    CORRELATION_KEYS.iter().find_map(|key| match data.get(*key) {
        Some(Value::String(s)) => Uuid::parse_str(s.trim()).ok(),
        _ => None,
    })
}

fn outcome_event(
    key: Uuid,
    config: &NotificationConfig,
    source_event: &str,
    error: Option<&str>,
) -> DomainEvent {
    let mut data = EventData::new();
    data.insert("provider".into(), Value::from(config.provider.as_str()));
    data.insert("notification_id".into(), Value::from(config.id.as_str()));
    data.insert("notification_name".into(), Value::from(config.name.as_str()));
    data.insert("event_type".into(), Value::from(source_event));

    let kind = match error {
        None => EventType::NotificationSent,
        Some(e) => {
            data.insert("error".into(), Value::from(e));
            EventType::NotificationFailed
        }
    };
    DomainEvent::new(CORRUPTION_AGGREGATE, key.to_string(), kind.as_str(), data)
}
