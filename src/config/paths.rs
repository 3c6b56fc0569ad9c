//! Configuration paths
//!
//! Utilities for resolving configuration file paths.

use std::path::PathBuf;

/// Get the configuration directory
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FASTPATH_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir()
        .map(|d| d.join("fastpath"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join("fastpath"))
                .unwrap_or_else(|| PathBuf::from(".fastpath"))
        })
}

/// Get the main configuration file path
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("FASTPATH_CONFIG") {
        return PathBuf::from(path);
    }

    config_dir().join("config.toml")
}

/// Get the state directory (for the SQLite database)
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FASTPATH_STATE_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_dir()
        .map(|d| d.join("fastpath"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".local").join("share").join("fastpath"))
                .unwrap_or_else(|| PathBuf::from(".fastpath"))
        })
}
