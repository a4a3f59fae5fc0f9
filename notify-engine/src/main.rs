use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use notify_engine::config::EngineSettings;
use notify_engine::database::{self, repositories::SqlxNotificationRepository};
use notify_engine::events::{DomainEvent, EventBus, InMemoryEventBus};
use notify_engine::logging::init_logging;
use notify_engine::notification::{HttpTransport, NotificationEngine};
use notify_engine::secrets::SecretCipher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = EngineSettings::from_env().context("loading settings")?;
    let (logging, _guard) = init_logging(&settings.log_dir).context("initialising logging")?;

    let shutdown = CancellationToken::new();
    logging.start_retention_cleanup(shutdown.clone());

    let pool = database::init_pool(&settings.database_url).await?;
    database::run_migrations(&pool).await?;

    let cipher = SecretCipher::new(settings.encryption_key.as_deref());
    if !cipher.is_enabled() {
        warn!("NOTIFY_ENCRYPTION_KEY is not set; notification configs are stored in plaintext");
    }

    let repo = Arc::new(SqlxNotificationRepository::with_timeout(
        pool.clone(),
        settings.store_timeout(),
    ));
    let bus = Arc::new(InMemoryEventBus::new());
    let transport = Arc::new(HttpTransport::new(settings.engine_config().http_timeout)?);

    let engine = NotificationEngine::new(
        settings.engine_config(),
        repo,
        bus.clone(),
        transport,
        cipher,
    )?;
    engine.start().await?;
    info!(stats = ?engine.stats(), "notify-engine ready, reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<DomainEvent>(line) {
                    Ok(event) => bus.publish(event).await?,
                    Err(e) => warn!(error = %e, "Skipping malformed event line"),
                }
            }
        }
    }

    engine.stop().await;
    shutdown.cancel();
    pool.close().await;
    Ok(())
}
