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

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `memory_capacity` is 0 or exceeds 100 000
    /// - `ttl_secs` or either sweep interval is 0
    /// - `io_timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "memory_capacity".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.memory_capacity > 100_000 {
            return Err(ConfigError::Invalid {
                field: "memory_capacity".into(),
                reason: "must not exceed 100000".into(),
            });
        }

        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid { field: "ttl_secs".into(), reason: "must be at least 1s".into() });
        }
        if self.memory_sweep_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "memory_sweep_secs".into(),
                reason: "must be at least 1s".into(),
            });
        }
        if self.persistent_sweep_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "persistent_sweep_secs".into(),
                reason: "must be at least 1s".into(),
            });
        }

        if self.io_timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "io_timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.io_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "io_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.memory_sweep_secs > self.ttl_secs {
            tracing::warn!(
                memory_sweep_secs = self.memory_sweep_secs,
                ttl_secs = self.ttl_secs,
                "memory sweep interval exceeds entry TTL; \
                 expired entries will linger until read or swept"
            );
        }

        Ok(())
    }
}
