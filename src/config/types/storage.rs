//! Storage and embedding configuration types
//!
//! Configuration for the SQLite store and the embedding provider.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// SQLite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file path
    #[serde(default = "default_sqlite_path")]
    pub path: String,
    /// Enable WAL mode
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Busy timeout in milliseconds
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            path: default_sqlite_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_sqlite_path() -> String {
    crate::config::state_dir()
        .join("fastpath.db")
        .to_string_lossy()
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_max_connections() -> u32 {
    5
}

/// Which backend produces embeddings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint (OpenRouter by default)
    #[default]
    OpenRouter,
    /// Local fastembed model
    Local,
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "openrouter" | "openai" | "remote" => Ok(EmbeddingProviderKind::OpenRouter),
            "local" | "fastembed" => Ok(EmbeddingProviderKind::Local),
            _ => Err(crate::Error::Config(format!(
                "Invalid embedding provider: {}. Valid options: openrouter, local",
                s
            ))),
        }
    }
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProviderKind::OpenRouter => write!(f, "openrouter"),
            EmbeddingProviderKind::Local => write!(f, "local"),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    /// Embedding model identifier (also scopes the memoization cache)
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimensions, used for zero vectors on provider failure
    #[serde(default = "default_embedding_dims")]
    pub dimensions: usize,
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key
    #[serde(skip_serializing, default = "default_secret")]
    pub api_key: SecretString,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            provider: EmbeddingProviderKind::default(),
            model: default_embedding_model(),
            dimensions: default_embedding_dims(),
            base_url: default_base_url(),
            api_key: default_secret(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_embedding_model() -> String {
    "openai/text-embedding-3-small".to_string()
}

fn default_embedding_dims() -> usize {
    1536
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_config_default() {
        let config = SqliteConfig::default();
        assert!(config.wal_mode);
        assert!(config.path.ends_with("fastpath.db"));
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            "openrouter".parse::<EmbeddingProviderKind>().unwrap(),
            EmbeddingProviderKind::OpenRouter
        );
        assert_eq!(
            "fastembed".parse::<EmbeddingProviderKind>().unwrap(),
            EmbeddingProviderKind::Local
        );
        assert!("cohere".parse::<EmbeddingProviderKind>().is_err());
    }

    #[test]
    fn test_embedding_config_default() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.dimensions, 1536);
        assert_eq!(config.provider, EmbeddingProviderKind::OpenRouter);
    }
}
