//! Subscriber setup for applications embedding the client.
//!
//! The crate itself only emits `tracing` events. Logins and downloads log at
//! `info`, every game request at `debug` under the network and auth modules.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::error::{ArkError, Result};

/// Modules that log each request they send.
pub const REQUEST_TARGETS: [&str; 2] = ["arkprts::core::network", "arkprts::core::auth"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    /// One JSON object per event, for log collectors.
    Json,
}

/// `[logging]` table of the client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
    /// Log every request at debug level regardless of `level`.
    pub requests: Option<bool>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn format(&self) -> LogFormat {
        self.format.unwrap_or_default()
    }

    pub fn requests(&self) -> bool {
        self.requests.unwrap_or(false)
    }

    /// Filter directives for the crate's events. Other crates stay at `warn`.
    pub fn directives(&self) -> String {
        let mut directives = vec!["warn".to_string(), format!("arkprts={}", self.level())];
        if self.requests() {
            directives.extend(REQUEST_TARGETS.iter().map(|target| format!("{target}=debug")));
        }
        directives.join(",")
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init_logger(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.directives()).map_err(|e| ArkError::ConfigError {
            message: format!("invalid logging level {:?}: {}", config.level(), e),
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format() {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(config.requests())
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().with_target(true).json())
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!("Logging initialized with {}", config.directives());
    }
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let config = LoggingConfig::default();

        assert_eq!(config.directives(), "warn,arkprts=info");
        assert_eq!(config.format(), LogFormat::Compact);
    }

    #[test]
    fn test_request_logging_enables_debug_targets() {
        let config = LoggingConfig {
            level: Some("warn".to_string()),
            format: Some(LogFormat::Json),
            requests: Some(true),
        };

        assert_eq!(
            config.directives(),
            "warn,arkprts=warn,arkprts::core::network=debug,arkprts::core::auth=debug"
        );
    }

    #[test]
    fn test_logger_installs_only_once() {
        let config = LoggingConfig::default();

        let _ = init_logger(&config).unwrap();
        assert!(!init_logger(&config).unwrap());
    }
}
