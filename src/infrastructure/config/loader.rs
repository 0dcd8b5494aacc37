//! Hierarchical configuration loading: built-in defaults, an optional config file, then environment overrides.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid check_interval_seconds: {0}. Must be greater than 0")]
    InvalidCheckInterval(u64),

    #[error("invalid working_hours: start ({0:02}:{1:02}) must be before end ({2:02}:{3:02})")]
    InvalidWorkingHours(u32, u32, u32, u32),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("state_root cannot be empty")]
    EmptyStateRoot,

    #[error("invalid ipc bind_address: {0}")]
    InvalidIpcBindAddress(String),

    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Serialized`)
    /// 2. `.backplane/config.yaml` (project config)
    /// 3. `.backplane/local.yaml` (project local overrides, optional)
    /// 4. Environment variables (`BACKPLANE_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".backplane/config.yaml"))
            .merge(Yaml::file(".backplane/local.yaml"))
            .merge(Env::prefixed("BACKPLANE_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still respecting
    /// environment-variable overrides.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("BACKPLANE_").split("__"))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.daemon.check_interval_seconds == 0 {
            return Err(ConfigError::InvalidCheckInterval(config.daemon.check_interval_seconds));
        }

        let hours = &config.working_hours;
        let start = hours.start_hour * 60 + hours.start_minute;
        let end = hours.end_hour * 60 + hours.end_minute;
        if start >= end {
            return Err(ConfigError::InvalidWorkingHours(hours.start_hour, hours.start_minute, hours.end_hour, hours.end_minute));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.state_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStateRoot);
        }

        if !config.ipc.bind_address.contains(':') {
            return Err(ConfigError::InvalidIpcBindAddress(config.ipc.bind_address.clone()));
        }

        if config.tracker.project.is_empty() {
            return Err(ConfigError::ValidationFailed("tracker.project cannot be empty".to_string()));
        }

        Ok(())
    }
}
