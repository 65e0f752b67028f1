//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_name` or `cache_version` is empty or contains whitespace
    /// - `origin` or `upstream_url` is not an absolute http(s) URL
    /// - `listen_addr` is not a socket address
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `precache` is empty or holds a path not starting with `/`
    /// - `image_max_entries` or `dynamic_max_age_secs` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("cache_name", &self.cache_name), ("cache_version", &self.cache_version)] {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(invalid(field, "must not contain whitespace"));
            }
        }

        for (field, value) in [("origin", &self.origin), ("upstream_url", &self.upstream_url)] {
            let parsed = url::Url::parse(value).map_err(|e| invalid(field, e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid(field, "scheme must be http or https"));
            }
            if parsed.host_str().is_none() {
                return Err(invalid(field, "must include a host"));
            }
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid("listen_addr", "must be a socket address like 127.0.0.1:8080"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.precache.is_empty() {
            return Err(invalid("precache", "must list at least the page entry point"));
        }
        if let Some(path) = self.precache.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("precache", format!("path must start with '/': {path}")));
        }

        if self.image_max_entries == 0 {
            return Err(invalid("image_max_entries", "must be greater than 0"));
        }
        if self.dynamic_max_age_secs == 0 {
            return Err(invalid("dynamic_max_age_secs", "must be greater than 0"));
        }

        if self.origin == self.upstream_url {
            tracing::warn!(
                origin = %self.origin,
                "origin and upstream_url are identical; the proxy will fetch from itself"
            );
        }

        Ok(())
    }
}
