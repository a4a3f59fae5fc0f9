//! Provider catalogue.
//!
//! Each provider turns its operator-supplied parameter blob into a
//! [`DeliveryPlan`]: either a transport descriptor (a URI-shaped string naming
//! destination, credentials and options) or a direct webhook target. Building a
//! plan never performs I/O.

mod chat;
mod email;
mod push;
mod webhook;

pub use webhook::{DEFAULT_CONTENT_TYPE, DEFAULT_METHOD, WebhookTarget, with_default_scheme};

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Supported notification providers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderType {
    Discord,
    Slack,
    Teams,
    Telegram,
    Pushover,
    Gotify,
    Ntfy,
    Email,
    GoogleChat,
    Matrix,
    Mattermost,
    Rocketchat,
    Zulip,
    Pushbullet,
    Bark,
    Join,
    Lark,
    Signal,
    Opsgenie,
    Ifttt,
    /// Direct JSON POST, bypassing the transport.
    Webhook,
    /// Generic webhook descriptor handled by the transport.
    Generic,
    /// Raw descriptor supplied by the operator.
    Custom,
}

/// How a message reaches its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryPlan {
    /// Hand the descriptor to the transport.
    Descriptor(String),
    /// Perform the HTTP call directly.
    Direct(WebhookTarget),
}

impl ProviderType {
    /// Parse a stored provider name.
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse()
            .map_err(|_| Error::UnknownProvider(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Discord => "Discord",
            Self::Slack => "Slack",
            Self::Teams => "Microsoft Teams",
            Self::Telegram => "Telegram",
            Self::Pushover => "Pushover",
            Self::Gotify => "Gotify",
            Self::Ntfy => "ntfy",
            Self::Email => "Email",
            Self::GoogleChat => "Google Chat",
            Self::Matrix => "Matrix",
            Self::Mattermost => "Mattermost",
            Self::Rocketchat => "Rocket.Chat",
            Self::Zulip => "Zulip",
            Self::Pushbullet => "Pushbullet",
            Self::Bark => "Bark",
            Self::Join => "Join",
            Self::Lark => "Lark",
            Self::Signal => "Signal",
            Self::Opsgenie => "Opsgenie",
            Self::Ifttt => "IFTTT",
            Self::Webhook => "Webhook",
            Self::Generic => "Generic Webhook",
            Self::Custom => "Custom",
        }
    }

    /// Build the delivery plan for a parameter blob.
    pub fn delivery_plan(&self, params: &Value) -> Result<DeliveryPlan> {
        let descriptor = match self {
            Self::Discord => chat::discord(self.params(params)?)?,
            Self::Slack => chat::slack(self.params(params)?)?,
            Self::Teams => chat::teams(self.params(params)?)?,
            Self::GoogleChat => chat::google_chat(self.params(params)?)?,
            Self::Matrix => chat::matrix(self.params(params)?)?,
            Self::Mattermost => chat::mattermost(self.params(params)?)?,
            Self::Rocketchat => chat::rocketchat(self.params(params)?)?,
            Self::Zulip => chat::zulip(self.params(params)?)?,
            Self::Lark => chat::lark(self.params(params)?)?,
            Self::Telegram => push::telegram(self.params(params)?)?,
            Self::Pushover => push::pushover(self.params(params)?)?,
            Self::Gotify => push::gotify(self.params(params)?)?,
            Self::Ntfy => push::ntfy(self.params(params)?)?,
            Self::Pushbullet => push::pushbullet(self.params(params)?)?,
            Self::Bark => push::bark(self.params(params)?)?,
            Self::Join => push::join(self.params(params)?)?,
            Self::Signal => push::signal(self.params(params)?)?,
            Self::Opsgenie => push::opsgenie(self.params(params)?)?,
            Self::Ifttt => push::ifttt(self.params(params)?)?,
            Self::Email => email::smtp(self.params(params)?)?,
            Self::Generic => webhook::generic(self.params(params)?)?,
            Self::Custom => webhook::custom(self.params(params)?)?,
            Self::Webhook => {
                return webhook::direct(self.params(params)?).map(DeliveryPlan::Direct);
            }
        };
        Ok(DeliveryPlan::Descriptor(descriptor))
    }

    fn params<T: DeserializeOwned>(&self, params: &Value) -> Result<T> {
        T::deserialize(params)
            .map_err(|e| Error::validation(format!("invalid {} parameters: {}", self.label(), e)))
    }
}

/// Trimmed value of a mandatory field, or a validation error naming it.
pub(crate) fn required<'a>(
    provider: ProviderType,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!(
            "{}: {} is required",
            provider.label(),
            field
        )));
    }
    Ok(value)
}

/// Trimmed value of an optional field, `None` when blank.
pub(crate) fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A server URL reduced to `host[:port][/path]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerAddr {
    pub host: String,
    /// The URL explicitly used `http://`.
    pub insecure: bool,
}

/// Strip scheme and trailing slashes from an embedded server URL.
pub(crate) fn server_addr(url: &str) -> ServerAddr {
    let url = url.trim();
    let (insecure, rest) = if let Some(rest) = url.strip_prefix("http://") {
        (true, rest)
    } else if let Some(rest) = url.strip_prefix("https://") {
        (false, rest)
    } else {
        (false, url)
    };
    ServerAddr {
        host: rest.trim_end_matches('/').to_string(),
        insecure,
    }
}

/// Percent-encode a descriptor component.
pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Append `key=value` pairs, skipping blank values.
pub(crate) fn with_query(base: String, pairs: &[(&str, Option<String>)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in pairs {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            query.append_pair(key, value);
            any = true;
        }
    }
    if !any {
        return base;
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, sep, query.finish())
}

/// Comma or whitespace separated list, blanks dropped.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '\n', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Integer field accepting a JSON number or a numeric string.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(v)) => Ok(Some(v)),
        Some(Raw::Float(v)) => Ok(Some(v as i64)),
        Some(Raw::Str(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("expected a number, got {:?}", s)))
        }
    }
}

/// Boolean field accepting `true`/`false`, `yes`/`no`, `1`/`0` in any JSON form.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(v)) => Ok(Some(v)),
        Some(Raw::Int(v)) => Ok(Some(v != 0)),
        Some(Raw::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "1" | "on" => Ok(Some(true)),
            "false" | "no" | "0" | "off" => Ok(Some(false)),
            other => Err(de::Error::custom(format!("expected a boolean, got {:?}", other))),
        },
    }
}

/// String field that may also arrive as a JSON number (chat ids, device ids).
pub(crate) fn string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}
