use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use notify_engine::database;
use notify_engine::database::repositories::{NotificationRepository, SqlxNotificationRepository};
use notify_engine::events::{DomainEvent, EventBus, EventData, InMemoryEventBus};
use notify_engine::notification::{
    DeliveryStatus, HttpTransport, NotificationConfigInput, NotificationEngine,
    NotificationEngineConfig, Transport,
};
use notify_engine::secrets::{SecretCipher, is_encrypted};

/// One captured HTTP request.
#[derive(Debug)]
struct Captured {
    head: String,
    body: Value,
}

/// Accept connections and answer every request with `status`.
async fn serve(status: u16) -> (String, mpsc::UnboundedReceiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break None;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            let Some(header_end) = header_end else { continue };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let length = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);
            let reason = if status < 400 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\ncontent-length: 4\r\nconnection: close\r\n\r\nnope",
                status, reason
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(Captured { head, body });
        }
    });

    (format!("http://{}", addr), rx)
}

struct Setup {
    _dir: TempDir,
    engine: Arc<NotificationEngine>,
    repo: Arc<SqlxNotificationRepository>,
    bus: Arc<InMemoryEventBus>,
}

async fn setup(transport: Arc<dyn Transport>) -> Setup {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("engine.db");
    let db_url = format!(
        "sqlite:{}?mode=rwc",
        db_path.to_string_lossy().replace('\\', "/")
    );
    let pool = database::init_pool(&db_url).await.unwrap();
    database::run_migrations(&pool).await.unwrap();

    let repo = Arc::new(SqlxNotificationRepository::new(pool));
    let bus = Arc::new(InMemoryEventBus::new());
    let engine = NotificationEngine::new(
        NotificationEngineConfig {
            http_timeout: Duration::from_secs(5),
            source: "media-healer".into(),
            ..NotificationEngineConfig::default()
        },
        repo.clone(),
        bus.clone(),
        transport,
        SecretCipher::new(Some("integration-key")),
    )
    .unwrap();
    engine.start().await.unwrap();

    Setup {
        _dir: dir,
        engine,
        repo,
        bus,
    }
}

fn input(value: Value) -> NotificationConfigInput {
    serde_json::from_value(value).unwrap()
}

fn event(event_type: &str, data: Value) -> DomainEvent {
    let Value::Object(map) = data else {
        panic!("event data must be an object");
    };
    DomainEvent::new("corruption", "agg-1", event_type, map)
}

async fn settle(engine: &NotificationEngine) {
    for _ in 0..500 {
        if engine.stats().in_flight == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("deliveries did not finish");
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Captured>) -> Captured {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("request not received")
        .expect("server stopped")
}

#[tokio::test]
async fn generic_webhook_delivery_is_encrypted_audited_and_correlated() {
    let (base, mut requests) = serve(200).await;
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
    let s = setup(transport).await;

    let outcomes = Arc::new(Mutex::new(Vec::<DomainEvent>::new()));
    let sink = outcomes.clone();
    s.bus.subscribe(
        "NotificationSent",
        Arc::new(move |e: DomainEvent| sink.lock().push(e)),
    );

    let config = s
        .engine
        .create_config(input(json!({
            "name": "lan hook",
            "provider": "generic",
            "params": {
                "webhook_url": format!("{}/hook", base),
                "title_key": "subject",
                "headers": "X-Token=abc",
            },
            "events": ["CorruptionDetected"],
        })))
        .await
        .unwrap();

    let stored = s.repo.get_config(&config.id).await.unwrap();
    assert!(is_encrypted(&stored.config));
    assert!(!stored.config.contains("/hook"));

    let corruption_id = uuid::Uuid::new_v4().to_string();
    s.bus
        .publish(event(
            "CorruptionDetected",
            json!({
                "corruption_id": corruption_id,
                "file_path": "/media/tv/show.mkv",
                "corruption_type": "truncated",
            }),
        ))
        .await
        .unwrap();

    let req = next(&mut requests).await;
    assert!(req.head.starts_with("POST /hook"));
    assert!(req.head.to_ascii_lowercase().contains("x-token: abc"));
    assert_eq!(req.body["subject"], "Corruption Detected: show.mkv");
    assert!(req.body["message"].as_str().unwrap().contains("truncated"));

    settle(&s.engine).await;
    let log = s.engine.get_delivery_log(&config.id, 10).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, DeliveryStatus::Sent);

    let outcomes = outcomes.lock().clone();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].aggregate_id, corruption_id);
    assert_eq!(outcomes[0].event_data["provider"], "generic");

    s.engine.stop().await;
}

#[tokio::test]
async fn direct_webhook_failure_is_recorded() {
    let (base, mut requests) = serve(500).await;
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
    let s = setup(transport).await;

    let config = s
        .engine
        .create_config(input(json!({
            "name": "json hook",
            "provider": "webhook",
            "params": {
                "webhook_url": format!("{}/events", base),
                "extra_data": "env=test",
            },
            "events": ["ScanCompleted"],
        })))
        .await
        .unwrap();

    s.bus
        .publish(event(
            "ScanCompleted",
            json!({ "path": "/media", "healthy_files": 9, "corrupt_files": 1, "total_files": 10 }),
        ))
        .await
        .unwrap();

    let req = next(&mut requests).await;
    assert_eq!(req.body["event"], "ScanCompleted");
    assert_eq!(req.body["source"], "media-healer");
    assert_eq!(req.body["data"]["env"], "test");
    assert_eq!(req.body["data"]["total_files"], 10);

    settle(&s.engine).await;
    let log = s.engine.get_delivery_log(&config.id, 10).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, DeliveryStatus::Failed);
    assert!(log[0].error.as_deref().unwrap().contains("HTTP 500"));

    s.engine.stop().await;
}

#[derive(Default)]
struct Recording {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for Recording {
    async fn send(&self, descriptor: &str, _title: &str, _message: &str) -> notify_engine::Result<()> {
        self.sent.lock().push(descriptor.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn throttle_and_lifecycle_over_sqlite() {
    let transport = Arc::new(Recording::default());
    let s = setup(transport.clone()).await;

    let config = s
        .engine
        .create_config(input(json!({
            "name": "ops",
            "provider": "telegram",
            "params": { "bot_token": "123:abc", "chat_id": "-100" },
            "events": ["SystemHealthDegraded"],
            "throttle_seconds": 3600,
        })))
        .await
        .unwrap();

    for _ in 0..3 {
        s.bus
            .publish(event("SystemHealthDegraded", json!({ "reason": "disk full" })))
            .await
            .unwrap();
    }
    settle(&s.engine).await;
    assert_eq!(transport.sent.lock().len(), 1);
    assert_eq!(s.engine.get_delivery_log(&config.id, 10).await.len(), 1);

    s.engine.delete_config(&config.id).await.unwrap();
    assert!(s.engine.list_configs().await.unwrap().is_empty());
    assert!(s.engine.get_delivery_log(&config.id, 10).await.is_empty());

    s.engine.stop().await;
    s.bus
        .publish(event("SystemHealthDegraded", EventData::new().into()))
        .await
        .unwrap();
    assert_eq!(transport.sent.lock().len(), 1);
}
