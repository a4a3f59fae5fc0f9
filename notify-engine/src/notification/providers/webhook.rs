//! Generic webhooks, direct webhooks and raw descriptors.

use serde::{Deserialize, Serialize};

use super::{ProviderType, optional, required, with_query};
use crate::{Error, Result};

/// Default method for webhook requests.
pub const DEFAULT_METHOD: &str = "POST";

/// Default content type for webhook requests.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Deserialize)]
pub(super) struct WebhookParams {
    #[serde(default)]
    webhook_url: String,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    message_key: Option<String>,
    #[serde(default)]
    title_key: Option<String>,
    /// One `Name=value` per line.
    #[serde(default)]
    headers: Option<String>,
    /// One `key=value` per line, merged into the payload.
    #[serde(default)]
    extra_data: Option<String>,
}

/// Destination of a direct webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub url: String,
    pub method: String,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub extra: Vec<(String, String)>,
}

/// Default the scheme to `https://` when absent.
pub fn with_default_scheme(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Parse `key=value` lines, ignoring blank lines.
pub(crate) fn parse_pairs(
    provider: ProviderType,
    field: &str,
    text: Option<&str>,
) -> Result<Vec<(String, String)>> {
    let Some(text) = text else {
        return Ok(Vec::new());
    };

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::validation(format!(
                    "{}: {} line {:?} is not key=value",
                    provider.label(),
                    field,
                    line
                ))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::validation(format!(
                    "{}: {} line {:?} has an empty key",
                    provider.label(),
                    field,
                    line
                )));
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Plain URL, or `generic+{url}?...` when any customisation is set.
pub(super) fn generic(p: WebhookParams) -> Result<String> {
    let provider = ProviderType::Generic;
    let url = with_default_scheme(required(provider, "webhook_url", &p.webhook_url)?);

    let headers = parse_pairs(provider, "headers", optional(&p.headers))?;
    let extra = parse_pairs(provider, "extra_data", optional(&p.extra_data))?;

    let header_keys: Vec<String> = headers.iter().map(|(k, _)| format!("@{}", k)).collect();
    let extra_keys: Vec<String> = extra.iter().map(|(k, _)| format!("${}", k)).collect();

    let mut pairs: Vec<(&str, Option<String>)> = vec![
        ("template", optional(&p.template).map(String::from)),
        ("method", optional(&p.method).map(str::to_ascii_uppercase)),
        ("contenttype", optional(&p.content_type).map(String::from)),
        ("messagekey", optional(&p.message_key).map(String::from)),
        ("titlekey", optional(&p.title_key).map(String::from)),
    ];
    if pairs.iter().all(|(_, v)| v.is_none()) && headers.is_empty() && extra.is_empty() {
        return Ok(url);
    }

    for (key, (_, value)) in header_keys.iter().zip(&headers) {
        pairs.push((key.as_str(), Some(value.clone())));
    }
    for (key, (_, value)) in extra_keys.iter().zip(&extra) {
        pairs.push((key.as_str(), Some(value.clone())));
    }

    Ok(with_query(format!("generic+{}", url), &pairs))
}

pub(super) fn direct(p: WebhookParams) -> Result<WebhookTarget> {
    let provider = ProviderType::Webhook;
    let url = with_default_scheme(required(provider, "webhook_url", &p.webhook_url)?);

    let method = optional(&p.method)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| DEFAULT_METHOD.to_string());
    if reqwest::Method::from_bytes(method.as_bytes()).is_err() {
        return Err(Error::validation(format!(
            "{}: invalid HTTP method {:?}",
            provider.label(),
            method
        )));
    }

    Ok(WebhookTarget {
        url,
        method,
        content_type: optional(&p.content_type)
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
        headers: parse_pairs(provider, "headers", optional(&p.headers))?,
        extra: parse_pairs(provider, "extra_data", optional(&p.extra_data))?,
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct CustomParams {
    #[serde(default)]
    url: String,
}

pub(super) fn custom(p: CustomParams) -> Result<String> {
    required(ProviderType::Custom, "url", &p.url).map(String::from)
}
