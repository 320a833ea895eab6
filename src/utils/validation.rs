//! Checks for user supplied client configuration.
//!
//! Each check names the config field it rejects so the message points at the
//! offending TOML key.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use url::Url;

use crate::domain::server::ArknightsServer;
use crate::utils::error::{ArkError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> ArkError {
    ArkError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parse a server slug such as `en` or `bili`.
pub fn server_slug(field: &str, slug: &str) -> Result<ArknightsServer> {
    slug.parse().map_err(|_| {
        let known: Vec<&str> = ArknightsServer::ALL.iter().map(|s| s.as_str()).collect();
        invalid(field, slug, format!("Valid servers: {}", known.join(", ")))
    })
}

/// An http(s) endpoint of a game server or of the game data mirror.
pub fn endpoint_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| invalid(field, value, format!("Not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(field, value, "Only http and https endpoints are reachable"));
    }
    if url.host_str().unwrap_or_default().is_empty() {
        return Err(invalid(field, value, "Endpoint has no host"));
    }
    Ok(())
}

/// Per-server URL table (`[network.routes]`, `[network.passports]`) keyed by
/// slug. Every key must be a server and every value an endpoint.
pub fn server_url_map(
    field: &str,
    map: Option<&HashMap<String, String>>,
) -> Result<HashMap<ArknightsServer, String>> {
    map.into_iter()
        .flatten()
        .map(|(slug, url)| {
            let server = server_slug(field, slug)?;
            endpoint_url(&format!("{field}.{slug}"), url)?;
            Ok((server, url.clone()))
        })
        .collect()
}

/// Excel table names become file names under `gamedata/excel/`.
pub fn table_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(field, name, "Table name is empty"));
    }
    if name.ends_with(".json") {
        return Err(invalid(field, name, "Table names are given without .json"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(invalid(field, name, "Table names use lowercase letters, digits and _"));
    }
    Ok(())
}

/// Game data repository in the form `owner/name`.
pub fn repository(field: &str, value: &str) -> Result<()> {
    match value.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(invalid(field, value, "Expected a repository in the form owner/name")),
    }
}

/// Directory or file the client writes to.
pub fn storage_path(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() || value.contains('\0') {
        return Err(invalid(field, value, "Not a usable file system path"));
    }
    Ok(())
}

pub fn within<T>(field: &str, value: T, bounds: RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if !bounds.contains(&value) {
        return Err(invalid(
            field,
            &value,
            format!("Expected {} to {}", bounds.start(), bounds.end()),
        ));
    }
    Ok(())
}

/// `tracing` level name.
pub fn log_level(field: &str, value: &str) -> Result<()> {
    value
        .parse::<tracing::Level>()
        .map(|_| ())
        .map_err(|_| invalid(field, value, "Expected trace, debug, info, warn or error"))
}
