//! Service configuration loaded from a JSON file.
//!
//! Every field carries a default, so a partial config file merges over the
//! default configuration rather than replacing it.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub producer: ProducerConfig,
    pub http: HttpConfig,
    pub collector: CollectorConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Time-series store connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub host: String,
    /// Authentication token; never logged.
    pub token: String,
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: "http://influxdb3-core:8181".to_string(),
            token: String::new(),
            database: "dev".to_string(),
        }
    }
}

/// Producer endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub host: String,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:28462".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Collection scheduling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub poll_interval_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}
