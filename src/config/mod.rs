//! Configuration module
//!
//! - types/mod.rs: Root `Config` and logging settings
//! - types/storage.rs: SQLite and embedding provider settings
//! - types/serving.rs: Cache, retrieval and router tunables
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

pub use types::{Config, LogConfig, LogFormat};

pub use types::storage::{EmbeddingConfig, EmbeddingProviderKind, SqliteConfig};

pub use types::serving::{RetrievalConfig, RouterConfig, SemanticCacheConfig};

pub use io::{apply_env_overrides, load_config, load_config_from_path, save_config};
pub use paths::{config_dir, config_path, state_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
