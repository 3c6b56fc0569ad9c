//! Configuration types module

pub mod serving;
pub mod storage;

use serde::{Deserialize, Serialize};

/// Main configuration for the serving core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// SQLite store
    #[serde(default)]
    pub storage: storage::SqliteConfig,

    /// Embedding provider
    #[serde(default)]
    pub embedding: storage::EmbeddingConfig,

    /// Semantic cache
    #[serde(default)]
    pub cache: serving::SemanticCacheConfig,

    /// Hybrid retrieval
    #[serde(default)]
    pub retrieval: serving::RetrievalConfig,

    /// Query router
    #[serde(default)]
    pub router: serving::RouterConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from defaults, config file and environment
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (used when RUST_LOG is unset)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info,fastpath=debug".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(crate::Error::Config(format!(
                "Invalid log format: {}. Valid options: pretty, json",
                s
            ))),
        }
    }
}
