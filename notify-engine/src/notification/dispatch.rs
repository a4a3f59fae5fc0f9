//! Executes a [`DeliveryPlan`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::formatter::EventFields;
use super::providers::{DeliveryPlan, WebhookTarget};
use super::transport::{Transport, execute, header_map, with_content_type};
use crate::{Error, Result};

/// A rendered notification ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingMessage<'a> {
    pub event_type: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    pub fields: &'a EventFields,
    pub timestamp: DateTime<Utc>,
}

/// Body of a direct webhook request.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    message: &'a str,
    event: &'a str,
    timestamp: String,
    source: &'a str,
    data: Map<String, Value>,
}

/// Routes descriptors to the transport and performs direct webhook calls.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    client: Client,
    source: String,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, client: Client, source: impl Into<String>) -> Self {
        Self {
            transport,
            client,
            source: source.into(),
        }
    }

    pub async fn deliver(&self, plan: &DeliveryPlan, msg: &OutgoingMessage<'_>) -> Result<()> {
        match plan {
            DeliveryPlan::Descriptor(descriptor) => {
                self.transport.send(descriptor, msg.title, msg.message).await
            }
            DeliveryPlan::Direct(target) => self.post_webhook(target, msg).await,
        }
    }

    async fn post_webhook(&self, target: &WebhookTarget, msg: &OutgoingMessage<'_>) -> Result<()> {
        let method = reqwest::Method::from_bytes(target.method.as_bytes())
            .map_err(|_| Error::validation(format!("invalid HTTP method {:?}", target.method)))?;
        let body = serde_json::to_vec(&self.payload(target, msg))?;

        debug!(method = %method, event_type = %msg.event_type, "Posting direct webhook");
        let request = self
            .client
            .request(method, &target.url)
            .headers(with_content_type(
                header_map(&target.headers)?,
                &target.content_type,
            )?)
            .body(body);
        execute(request).await
    }

    fn payload<'a>(&'a self, target: &WebhookTarget, msg: &OutgoingMessage<'a>) -> WebhookPayload<'a> {
        WebhookPayload {
            title: msg.title,
            message: msg.message,
            event: msg.event_type,
            timestamp: msg.timestamp.to_rfc3339(),
            source: &self.source,
            data: payload_data(msg.fields, &target.extra),
        }
    }
}

/// Event fields that are present, plus operator extras.
fn payload_data(fields: &EventFields, extra: &[(String, String)]) -> Map<String, Value> {
    let mut data = Map::new();

    let strings = [
        ("file_path", fields.file_path.as_deref()),
        (
            "file_name",
            Some(fields.file_name.as_str()).filter(|s| !s.is_empty()),
        ),
        ("corruption_type", fields.corruption_type.as_deref()),
        ("path", fields.path.as_deref()),
        ("error", fields.error.as_deref()),
        ("reason", fields.reason.as_deref()),
    ];
    for (key, value) in strings {
        if let Some(value) = value {
            data.insert(key.to_string(), Value::from(value));
        }
    }

    let numbers = [
        ("healthy_files", fields.healthy_files),
        ("corrupt_files", fields.corrupt_files),
        ("total_files", fields.total_files),
        ("retry_count", fields.retry_count),
        ("max_retries", fields.max_retries),
        ("attempts", fields.attempts),
    ];
    for (key, value) in numbers {
        if let Some(value) = value {
            data.insert(key.to_string(), Value::from(value));
        }
    }

    for (key, value) in extra {
        data.insert(key.clone(), Value::from(value.as_str()));
    }
    data
}
