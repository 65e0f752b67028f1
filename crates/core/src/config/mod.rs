//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LANDER_*)
//! 2. TOML config file (if LANDER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::PartitionNames;

mod validation;

pub use validation::ConfigError;

/// Which surface the `lander` binary exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// HTTP interception proxy in front of the upstream site.
    Proxy,
    /// MCP tool server on stdio.
    Mcp,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LANDER_*)
/// 2. TOML config file (if LANDER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name used as the partition name prefix.
    ///
    /// Set via LANDER_CACHE_NAME environment variable.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Deployment version tag. Changing it retires every existing partition
    /// on the next activation.
    ///
    /// Set via LANDER_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin of the page whose requests are intercepted.
    ///
    /// Set via LANDER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Where network fetches for the page origin are actually sent.
    ///
    /// Set via LANDER_UPSTREAM_URL environment variable.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Socket address the proxy listens on.
    ///
    /// Set via LANDER_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Surface to run: `proxy` or `mcp`.
    ///
    /// Set via LANDER_MODE environment variable.
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Path to SQLite cache database.
    ///
    /// Set via LANDER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for upstream requests.
    ///
    /// Set via LANDER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via LANDER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via LANDER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Paths pre-warmed into the static partition at install.
    ///
    /// Set via LANDER_PRECACHE environment variable.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Maximum number of entries in the image partition.
    ///
    /// Set via LANDER_IMAGE_MAX_ENTRIES environment variable.
    #[serde(default = "default_image_max_entries")]
    pub image_max_entries: usize,

    /// Freshness window for generic dynamic content, in seconds.
    ///
    /// Set via LANDER_DYNAMIC_MAX_AGE_SECS environment variable.
    #[serde(default = "default_dynamic_max_age_secs")]
    pub dynamic_max_age_secs: u64,
}

fn default_cache_name() -> String {
    "lander".into()
}

fn default_cache_version() -> String {
    "1.0.0".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_mode() -> Mode {
    Mode::Proxy
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./lander-cache.sqlite")
}

fn default_user_agent() -> String {
    "lander/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_precache() -> Vec<String> {
    vec!["/".into(), "/index.html".into()]
}

fn default_image_max_entries() -> usize {
    50
}

fn default_dynamic_max_age_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            upstream_url: default_upstream_url(),
            listen_addr: default_listen_addr(),
            mode: default_mode(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            precache: default_precache(),
            image_max_entries: default_image_max_entries(),
            dynamic_max_age_secs: default_dynamic_max_age_secs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Freshness window for generic dynamic entries.
    pub fn dynamic_max_age(&self) -> Duration {
        Duration::from_secs(self.dynamic_max_age_secs)
    }

    /// The three partition names current for this version tag.
    pub fn partition_names(&self) -> PartitionNames {
        PartitionNames::new(&self.cache_name, &self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LANDER_`
    /// 2. TOML file from `LANDER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LANDER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LANDER_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
