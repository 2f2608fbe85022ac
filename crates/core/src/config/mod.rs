//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (QUERY_CACHE_*)
//! 2. TOML config file (if QUERY_CACHE_CONFIG_FILE set)
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
/// 1. Environment variables (QUERY_CACHE_*)
/// 2. TOML config file (if QUERY_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via QUERY_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Maximum number of entries held by the memory tier.
    ///
    /// Set via QUERY_CACHE_MEMORY_CAPACITY environment variable.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Default time-to-live of a stored result, in seconds.
    ///
    /// Set via QUERY_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval between memory-tier expiry sweeps, in seconds.
    #[serde(default = "default_memory_sweep_secs")]
    pub memory_sweep_secs: u64,

    /// Interval between persistent-tier expiry sweeps, in seconds.
    #[serde(default = "default_persistent_sweep_secs")]
    pub persistent_sweep_secs: u64,

    /// Upper bound on any single persistent-tier call, in milliseconds.
    ///
    /// Set via QUERY_CACHE_IO_TIMEOUT_MS environment variable.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./query-cache.sqlite")
}

fn default_memory_capacity() -> usize {
    100
}

fn default_ttl_secs() -> u64 {
    86_400 // 24h
}

fn default_memory_sweep_secs() -> u64 {
    600
}

fn default_persistent_sweep_secs() -> u64 {
    3_600
}

fn default_io_timeout_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            memory_capacity: default_memory_capacity(),
            ttl_secs: default_ttl_secs(),
            memory_sweep_secs: default_memory_sweep_secs(),
            persistent_sweep_secs: default_persistent_sweep_secs(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Default entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn memory_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.memory_sweep_secs)
    }

    pub fn persistent_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.persistent_sweep_secs)
    }

    /// I/O timeout as Duration for use with `tokio::time::timeout`.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `QUERY_CACHE_`
    /// 2. TOML file from `QUERY_CACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("QUERY_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("QUERY_CACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Path of the database as a string, for log fields.
    pub fn db_path_display(&self) -> String {
        self.db_path.display().to_string()
    }

    /// Require a non-empty database path before opening the persistent tier.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `db_path` is empty.
    pub fn require_db_path(&self) -> Result<&std::path::Path, ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "db_path".into(),
                hint: "Set QUERY_CACHE_DB_PATH environment variable".into(),
            });
        }
        Ok(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./query-cache.sqlite"));
        assert_eq!(config.memory_capacity, 100);
        assert_eq!(config.ttl_secs, 86_400);
        assert_eq!(config.memory_sweep_secs, 600);
        assert_eq!(config.persistent_sweep_secs, 3_600);
        assert_eq!(config.io_timeout_ms, 5_000);
    }

    #[test]
    fn test_duration_accessors() {
        let config = AppConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(86_400));
        assert_eq!(config.memory_sweep_interval(), Duration::from_secs(600));
        assert_eq!(config.persistent_sweep_interval(), Duration::from_secs(3_600));
        assert_eq!(config.io_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_require_db_path_missing() {
        let config = AppConfig { db_path: PathBuf::new(), ..Default::default() };
        let result = config.require_db_path();
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_db_path_present() {
        let config = AppConfig::default();
        assert_eq!(config.require_db_path().unwrap(), std::path::Path::new("./query-cache.sqlite"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.toml");
        std::fs::write(&path, "memory_capacity = 42\nttl_secs = 60\n").unwrap();

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();

        assert_eq!(config.memory_capacity, 42);
        assert_eq!(config.ttl_secs, 60);
        assert_eq!(config.io_timeout_ms, 5_000);
    }
}
