//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        toml::from_str(&content)
            .map_err(|e| Error::Config(e.to_string()))
            .or_else(|_| json5::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first, then overlays any set variables. Env vars have the
/// highest precedence: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable source
pub(crate) fn apply_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    use secrecy::SecretString;

    // Storage
    if let Some(path) = var("DB_PATH") {
        config.storage.path = path;
    }
    if let Some(v) = var("DB_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
        config.storage.max_connections = v;
    }

    // Embedding
    if let Some(provider) = var("EMBEDDING_PROVIDER").and_then(|v| v.parse().ok()) {
        config.embedding.provider = provider;
    }
    if let Some(model) = var("EMBEDDING_MODEL") {
        config.embedding.model = model;
    }
    if let Some(v) = var("EMBEDDING_DIMENSIONS").and_then(|v| v.parse().ok()) {
        config.embedding.dimensions = v;
    }
    if let Some(api_key) = var("OPENROUTER_API_KEY") {
        config.embedding.api_key = SecretString::from(api_key.trim().to_string());
    }
    if let Some(url) = var("OPENROUTER_BASE_URL") {
        config.embedding.base_url = url;
    }

    // Semantic cache
    if let Some(v) = var("CACHE_SIMILARITY_THRESHOLD").and_then(|v| v.parse().ok()) {
        config.cache.similarity_threshold = v;
    }
    if let Some(v) = var("CACHE_MAX_ENTRIES").and_then(|v| v.parse().ok()) {
        config.cache.max_entries = v;
    }
    if let Some(v) = var("CACHE_TTL").and_then(|v| humantime_serde::re::humantime::parse_duration(&v).ok()) {
        config.cache.ttl = v;
    }

    // Retrieval
    if let Some(v) = var("RETRIEVAL_TOP_K").and_then(|v| v.parse().ok()) {
        config.retrieval.top_k = v;
    }

    // Router
    if let Some(model) = var("OPENROUTER_MODEL") {
        config.router.balanced_model = model;
    }
    if let Some(model) = var("FAST_MODEL") {
        config.router.fast_model = model;
    }
    if let Some(model) = var("POWERFUL_MODEL") {
        config.router.powerful_model = model;
    }

    // Logging
    if let Some(level) = var("RUST_LOG") {
        config.log.level = level;
    }
    if let Some(format) = var("LOG_FORMAT").and_then(|v| v.parse().ok()) {
        config.log.format = format;
    }
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "json") {
        serde_json::to_string_pretty(config)?
    } else {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingProviderKind, LogFormat};
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.cache.max_entries = 42;
        save_config(&config, &path).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.cache.max_entries, 42);
        assert_eq!(loaded.router.fast_model, config.router.fast_model);
    }

    #[test]
    fn test_load_json5_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            "{ // comments allowed\n cache: { similarity_threshold: 0.97, ttl: '30m' } }",
        )
        .unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.cache.similarity_threshold, 0.97);
        assert_eq!(loaded.cache.ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DB_PATH", "/tmp/test.db"),
            ("EMBEDDING_PROVIDER", "local"),
            ("EMBEDDING_DIMENSIONS", "384"),
            ("OPENROUTER_API_KEY", " sk-test \n"),
            ("CACHE_TTL", "12h"),
            ("CACHE_MAX_ENTRIES", "not-a-number"),
            ("POWERFUL_MODEL", "anthropic/claude-opus-4"),
            ("LOG_FORMAT", "json"),
        ]);

        let mut config = Config::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.path, "/tmp/test.db");
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Local);
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.embedding.api_key.expose_secret(), "sk-test");
        assert_eq!(config.cache.ttl, Duration::from_secs(12 * 3600));
        // Unparseable values leave the default in place
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.router.powerful_model, "anthropic/claude-opus-4");
        assert_eq!(config.log.format, LogFormat::Json);
    }
}
