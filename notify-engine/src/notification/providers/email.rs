//! Email over SMTP.

use serde::{Deserialize, Deserializer};

use super::{ProviderType, encode, lenient_bool, lenient_i64, optional, required, split_list, with_query};
use crate::{Error, Result};

const DEFAULT_SMTP_PORT: i64 = 587;

#[derive(Debug, Deserialize)]
pub(super) struct EmailParams {
    #[serde(default)]
    smtp_host: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    smtp_port: Option<i64>,
    #[serde(default)]
    smtp_username: Option<String>,
    #[serde(default)]
    smtp_password: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    use_tls: Option<bool>,
    #[serde(default)]
    from_address: String,
    #[serde(default, deserialize_with = "address_list")]
    to_addresses: Vec<String>,
}

/// Recipients as a JSON array or a comma separated string.
fn address_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::One(s)) => split_list(&s),
        Some(Raw::Many(v)) => v.iter().flat_map(|s| split_list(s)).collect(),
    })
}

/// `smtp://[user:pass@]host:port/?from=..&to=..&usetls=yes|no`.
pub(super) fn smtp(p: EmailParams) -> Result<String> {
    let provider = ProviderType::Email;
    let host = required(provider, "smtp_host", &p.smtp_host)?;
    let from = required(provider, "from_address", &p.from_address)?;
    if p.to_addresses.is_empty() {
        return Err(Error::validation(format!(
            "{}: to_addresses is required",
            provider.label()
        )));
    }

    let port = p.smtp_port.unwrap_or(DEFAULT_SMTP_PORT);
    if !(1..=65535).contains(&port) {
        return Err(Error::validation(format!(
            "{}: smtp_port {} is out of range",
            provider.label(),
            port
        )));
    }

    let auth = match (optional(&p.smtp_username), optional(&p.smtp_password)) {
        (Some(user), Some(pass)) => format!("{}:{}@", encode(user), encode(pass)),
        (Some(user), None) => format!("{}@", encode(user)),
        _ => String::new(),
    };
    let use_tls = p.use_tls.unwrap_or(true);

    Ok(with_query(
        format!("smtp://{}{}:{}/", auth, host, port),
        &[
            ("from", Some(from.to_string())),
            ("to", Some(p.to_addresses.join(","))),
            ("usetls", Some(if use_tls { "yes" } else { "no" }.to_string())),
        ],
    ))
}
