use crate::core::assets::{DEFAULT_REFRESH_INTERVAL, DEFAULT_TABLES, GITHUB_API_URL, GITHUB_RAW_URL};
use crate::core::auth::guest::{GuestCache, DEFAULT_MAX_SESSIONS};
use crate::domain::server::ArknightsServer;
use crate::utils::error::{ArkError, Result};
use crate::utils::logger::{self, LoggingConfig};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SERVER: &str = "ARKPRTS_SERVER";
pub const ENV_ASSETS_DIR: &str = "ARKPRTS_ASSETS_DIR";
pub const ENV_GUEST_CACHE: &str = "ARKPRTS_GUEST_CACHE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub guest: GuestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub default_server: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Network configuration URL per server slug.
    pub routes: Option<HashMap<String, String>>,
    /// Yostar passport URL per server slug.
    pub passports: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetsConfig {
    pub enabled: Option<bool>,
    pub directory: Option<String>,
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub github_api_url: Option<String>,
    pub raw_url: Option<String>,
    pub tables: Option<Vec<String>>,
    pub refresh_interval_hours: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestConfig {
    pub max_sessions: Option<usize>,
    pub cache_path: Option<String>,
    pub cache_enabled: Option<bool>,
}

impl ClientConfig {
    /// Load from a TOML file. Environment overrides are applied afterwards.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ArkError::IoError)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ArkError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Defaults plus environment overrides, without a file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Replace `${VAR}` with the environment value, unknown variables stay as is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ArkError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Install a global subscriber from the `[logging]` table.
    pub fn init_logging(&self) -> Result<bool> {
        logger::init_logger(&self.logging)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(server) = std::env::var(ENV_SERVER) {
            self.network.default_server = Some(server);
        }
        if let Ok(directory) = std::env::var(ENV_ASSETS_DIR) {
            self.assets.directory = Some(directory);
        }
        if let Ok(cache) = std::env::var(ENV_GUEST_CACHE) {
            if cache.is_empty() || cache == "false" {
                self.guest.cache_enabled = Some(false);
            } else {
                self.guest.cache_path = Some(cache);
            }
        }
    }
}

impl NetworkConfig {
    pub fn default_server(&self) -> Result<Option<ArknightsServer>> {
        self.default_server
            .as_deref()
            .map(|slug| validation::server_slug("network.default_server", slug))
            .transpose()
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(30)
    }

    pub fn route_overrides(&self) -> Result<HashMap<ArknightsServer, String>> {
        validation::server_url_map("network.routes", self.routes.as_ref())
    }

    pub fn passport_overrides(&self) -> Result<HashMap<ArknightsServer, String>> {
        validation::server_url_map("network.passports", self.passports.as_ref())
    }
}

impl AssetsConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn directory(&self) -> PathBuf {
        self.directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("arkprts_gamedata"))
    }

    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    pub fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or("HEAD")
    }

    pub fn github_api_url(&self) -> &str {
        self.github_api_url.as_deref().unwrap_or(GITHUB_API_URL)
    }

    pub fn raw_url(&self) -> &str {
        self.raw_url.as_deref().unwrap_or(GITHUB_RAW_URL)
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables
            .clone()
            .unwrap_or_else(|| DEFAULT_TABLES.iter().map(|t| t.to_string()).collect())
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval_hours
            .map(|hours| Duration::from_secs(hours * 60 * 60))
            .unwrap_or(DEFAULT_REFRESH_INTERVAL)
    }
}

impl GuestConfig {
    pub fn max_sessions(&self) -> usize {
        self.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS)
    }

    pub fn cache(&self) -> GuestCache {
        if !self.cache_enabled.unwrap_or(true) {
            return GuestCache::Disabled;
        }
        match &self.cache_path {
            Some(path) => GuestCache::Path(PathBuf::from(path)),
            None => GuestCache::Default,
        }
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.network.default_server()?;
        validation::within("network.timeout_seconds", self.network.timeout_seconds(), 1..=600)?;
        self.network.route_overrides()?;
        self.network.passport_overrides()?;

        if let Some(directory) = &self.assets.directory {
            validation::storage_path("assets.directory", directory)?;
        }
        if let Some(repository) = &self.assets.repository {
            validation::repository("assets.repository", repository)?;
        }
        validation::endpoint_url("assets.github_api_url", self.assets.github_api_url())?;
        validation::endpoint_url("assets.raw_url", self.assets.raw_url())?;
        for table in self.assets.tables.iter().flatten() {
            validation::table_name("assets.tables", table)?;
        }
        if let Some(hours) = self.assets.refresh_interval_hours {
            validation::within("assets.refresh_interval_hours", hours, 1..=24 * 30)?;
        }

        validation::within("guest.max_sessions", self.guest.max_sessions(), 1..=64)?;
        if let Some(path) = &self.guest.cache_path {
            validation::storage_path("guest.cache_path", path)?;
        }

        validation::log_level("logging.level", self.logging.level())?;
        Ok(())
    }
}
