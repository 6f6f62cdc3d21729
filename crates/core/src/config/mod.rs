//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELFMARK_*)
//! 2. TOML config file (if SHELFMARK_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELFMARK_*)
/// 2. TOML config file (if SHELFMARK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite key-value store.
    ///
    /// Set via SHELFMARK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SHELFMARK_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SHELFMARK_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum entry count a map feed must carry to be believed.
    /// Rejects truncated or error responses masquerading as data.
    ///
    /// Set via SHELFMARK_MIN_FEED_ENTRIES environment variable.
    #[serde(default = "default_min_feed_entries")]
    pub min_feed_entries: usize,

    /// Account snapshot endpoint.
    #[serde(default = "default_account_url")]
    pub account_url: String,

    /// Delisted-items registry endpoint.
    #[serde(default = "default_delisted_url")]
    pub delisted_url: String,

    /// Downloadable-content map endpoint.
    #[serde(default = "default_dlc_url")]
    pub dlc_url: String,

    /// Trading-card map endpoint.
    #[serde(default = "default_cards_url")]
    pub cards_url: String,

    /// Bundle-history map endpoint.
    #[serde(default = "default_bundles_url")]
    pub bundles_url: String,

    /// Low-confidence-flag map endpoint.
    #[serde(default = "default_limited_url")]
    pub limited_url: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shelfmark.sqlite")
}

fn default_user_agent() -> String {
    "shelfmark/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_min_feed_entries() -> usize {
    7000
}

fn default_account_url() -> String {
    "https://store.steampowered.com/dynamicstore/userdata/".into()
}

fn default_delisted_url() -> String {
    "https://steam-tracker.com/api?action=GetAppListV3".into()
}

fn default_dlc_url() -> String {
    "https://bartervg.com/browse/dlc/json/".into()
}

fn default_cards_url() -> String {
    "https://bartervg.com/browse/cards/json/".into()
}

fn default_bundles_url() -> String {
    "https://bartervg.com/browse/bundles/json/".into()
}

fn default_limited_url() -> String {
    "https://bartervg.com/browse/tag/481/json/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            min_feed_entries: default_min_feed_entries(),
            account_url: default_account_url(),
            delisted_url: default_delisted_url(),
            dlc_url: default_dlc_url(),
            cards_url: default_cards_url(),
            bundles_url: default_bundles_url(),
            limited_url: default_limited_url(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELFMARK_`
    /// 2. TOML file from `SHELFMARK_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHELFMARK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELFMARK_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./shelfmark.sqlite"));
        assert_eq!(config.user_agent, "shelfmark/0.1");
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.min_feed_entries, 7000);
        assert!(config.account_url.starts_with("https://"));
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
    }
}
