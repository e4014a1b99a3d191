//! Service configuration.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//!
//! [logging]
//! level = "debug"
//!
//! [ingest]
//! status_ttl_secs = 240
//! debounce_secs = 60
//! commit_attempts = 3
//! notify_buffer = 64
//! ```
//!
//! Every section and key is optional.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must not be empty".to_string()));
        }
        self.ingest.validate()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl LoggingConfig {
    /// Falls back to INFO for unknown level names.
    pub fn tracing_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// 30 days.
pub const MAX_STATUS_TTL_SECS: u64 = 30 * 24 * 60 * 60;
/// One day.
pub const MAX_DEBOUNCE_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Lifetime of the cached status snapshot.
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,
    /// Legacy reports without an event are ignored this long after the
    /// current print was last updated.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: i64,
    #[serde(default = "default_commit_attempts")]
    pub commit_attempts: u32,
    #[serde(default = "default_notify_buffer")]
    pub notify_buffer: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            status_ttl_secs: default_status_ttl_secs(),
            debounce_secs: default_debounce_secs(),
            commit_attempts: default_commit_attempts(),
            notify_buffer: default_notify_buffer(),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_STATUS_TTL_SECS).contains(&self.status_ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "ingest.status_ttl_secs must be between 1 and {MAX_STATUS_TTL_SECS}"
            )));
        }
        if !(0..=MAX_DEBOUNCE_SECS).contains(&self.debounce_secs) {
            return Err(ConfigError::Invalid(format!(
                "ingest.debounce_secs must be between 0 and {MAX_DEBOUNCE_SECS}"
            )));
        }
        if self.commit_attempts == 0 {
            return Err(ConfigError::Invalid("ingest.commit_attempts must be > 0".to_string()));
        }
        if self.notify_buffer == 0 {
            return Err(ConfigError::Invalid("ingest.notify_buffer must be > 0".to_string()));
        }
        Ok(())
    }

    /// Clamped to the accepted range, so an unvalidated config cannot overflow.
    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs.min(MAX_STATUS_TTL_SECS))
    }

    pub fn debounce_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.debounce_secs.clamp(0, MAX_DEBOUNCE_SECS))
    }
}

fn default_bind() -> String { "0.0.0.0:3000".to_string() }
fn default_level() -> String { "info".to_string() }
fn default_status_ttl_secs() -> u64 { 240 }
fn default_debounce_secs() -> i64 { 60 }
fn default_commit_attempts() -> u32 { 3 }
fn default_notify_buffer() -> usize { 64 }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}
