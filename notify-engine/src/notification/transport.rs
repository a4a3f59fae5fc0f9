//! Outbound transport for descriptor-based providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use super::providers::{DEFAULT_CONTENT_TYPE, DEFAULT_METHOD};
use crate::utils::http_client::{build_client, truncate_string};
use crate::{Error, Result};

/// Longest response body echoed into an error.
const MAX_ERROR_BODY_CHARS: usize = 200;

const GENERIC_PREFIX: &str = "generic+";

/// Delivers a rendered message to the destination a descriptor names.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, descriptor: &str, title: &str, message: &str) -> Result<()>;
}

/// Transport for the generic webhook family (`generic+http(s)://` and plain
/// `http(s)://` descriptors).
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(build_client(request_timeout)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, descriptor: &str, title: &str, message: &str) -> Result<()> {
        let request = GenericRequest::parse(descriptor)?;
        debug!(
            host = request.url.host_str().unwrap_or_default(),
            method = %request.method,
            "Sending generic webhook"
        );

        let builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(with_content_type(
                request.headers.clone(),
                &request.content_type,
            )?)
            .body(request.body(title, message)?);
        execute(builder).await
    }
}

/// Send `builder`, mapping transport failures and error statuses to
/// [`Error::Transport`].
pub(crate) async fn execute(builder: RequestBuilder) -> Result<()> {
    let response = builder
        .send()
        .await
        .map_err(|e| Error::transport(format!("request failed: {}", e.without_url())))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::transport(format!(
            "HTTP {}: {}",
            status.as_u16(),
            truncate_string(body.trim(), MAX_ERROR_BODY_CHARS)
        )));
    }
    Ok(())
}

/// Parse `Name=value` header pairs into a header map.
pub(crate) fn header_map(pairs: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::transport(format!("invalid header name {:?}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::transport(format!("invalid value for header {}", name)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Add `content_type` unless the custom headers already set one.
pub(crate) fn with_content_type(mut headers: HeaderMap, content_type: &str) -> Result<HeaderMap> {
    if !headers.contains_key(CONTENT_TYPE) {
        let value = HeaderValue::from_str(content_type)
            .map_err(|_| Error::transport(format!("invalid content type {:?}", content_type)))?;
        headers.insert(CONTENT_TYPE, value);
    }
    Ok(headers)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    Json,
    Text,
}

/// A generic webhook descriptor decoded into request parts.
#[derive(Debug)]
struct GenericRequest {
    url: Url,
    method: Method,
    content_type: String,
    headers: HeaderMap,
    template: Template,
    title_key: String,
    message_key: String,
    extra: Vec<(String, String)>,
}

impl GenericRequest {
    fn parse(descriptor: &str) -> Result<Self> {
        let (raw, parameterised) = match descriptor.strip_prefix(GENERIC_PREFIX) {
            Some(rest) => (rest, true),
            None => (descriptor, false),
        };

        let mut url = Url::parse(raw).map_err(|_| {
            Error::transport(format!(
                "unsupported descriptor scheme {:?}",
                scheme_of(descriptor)
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::transport(format!(
                "unsupported descriptor scheme {:?}",
                scheme_of(descriptor)
            )));
        }

        let mut request = Self {
            url: url.clone(),
            method: Method::POST,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            headers: HeaderMap::new(),
            template: Template::Json,
            title_key: "title".to_string(),
            message_key: "message".to_string(),
            extra: Vec::new(),
        };
        if !parameterised {
            return Ok(request);
        }

        let mut method = DEFAULT_METHOD.to_string();
        let mut header_pairs = Vec::new();
        let mut kept = Vec::new();
        for (key, value) in url.query_pairs() {
            let (key, value) = (key.into_owned(), value.into_owned());
            match key.as_str() {
                "template" => {
                    request.template = match value.to_ascii_lowercase().as_str() {
                        "json" => Template::Json,
                        "text" => Template::Text,
                        other => {
                            return Err(Error::transport(format!(
                                "unsupported template {:?}",
                                other
                            )));
                        }
                    }
                }
                "method" => method = value.to_ascii_uppercase(),
                "contenttype" => request.content_type = value,
                "titlekey" => request.title_key = value,
                "messagekey" => request.message_key = value,
                _ => {
                    if let Some(name) = key.strip_prefix('@') {
                        header_pairs.push((name.to_string(), value));
                    } else if let Some(name) = key.strip_prefix('$') {
                        request.extra.push((name.to_string(), value));
                    } else {
                        kept.push((key, value));
                    }
                }
            }
        }

        request.method = Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::transport(format!("invalid HTTP method {:?}", method)))?;
        request.headers = header_map(&header_pairs)?;

        url.set_query(None);
        if !kept.is_empty() {
            url.query_pairs_mut().extend_pairs(kept);
        }
        request.url = url;
        Ok(request)
    }

    fn body(&self, title: &str, message: &str) -> Result<String> {
        match self.template {
            Template::Text => Ok(message.to_string()),
            Template::Json => {
                let mut body = Map::new();
                for (key, value) in &self.extra {
                    body.insert(key.clone(), Value::String(value.clone()));
                }
                body.insert(self.title_key.clone(), Value::String(title.to_string()));
                body.insert(self.message_key.clone(), Value::String(message.to_string()));
                Ok(serde_json::to_string(&Value::Object(body))?)
            }
        }
    }
}

/// Scheme of a descriptor without echoing credentials.
fn scheme_of(descriptor: &str) -> &str {
    descriptor
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .unwrap_or("")
}
