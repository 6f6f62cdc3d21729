//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

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

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `min_feed_entries` is 0
    /// - any endpoint URL is not http(s)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.min_feed_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "min_feed_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }

        for (field, url) in [
            ("account_url", &self.account_url),
            ("delisted_url", &self.delisted_url),
            ("dlc_url", &self.dlc_url),
            ("cards_url", &self.cards_url),
            ("bundles_url", &self.bundles_url),
            ("limited_url", &self.limited_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: format!("'{url}' is not an http(s) URL"),
                });
            }
        }

        Ok(())
    }
}
