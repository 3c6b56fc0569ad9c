//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::storage::EmbeddingProviderKind;
use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_embedding_config(config, result);
    result = validate_cache_config(config, result);
    result = validate_retrieval_config(config, result);

    result
}

fn validate_embedding_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.embedding.dimensions == 0 {
        result = result.with_error(ValidationIssue::new(
            "embedding.dimensions",
            "Embedding dimensions must be greater than zero",
        ));
    }

    if config.embedding.provider == EmbeddingProviderKind::OpenRouter
        && config.embedding.api_key.expose_secret().is_empty()
    {
        result = result.with_error(
            ValidationIssue::new(
                "embedding.api_key",
                "OpenRouter embedding provider selected but no API key configured",
            )
            .with_suggestion("Set OPENROUTER_API_KEY or switch embedding.provider to \"local\""),
        );
    }

    result
}

fn validate_cache_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let threshold = config.cache.similarity_threshold;

    if !(0.0..=1.0).contains(&threshold) {
        result = result.with_error(ValidationIssue::new(
            "cache.similarity_threshold",
            format!("Similarity threshold must be within [0, 1], got {}", threshold),
        ));
    } else if threshold < 0.8 {
        result = result.with_warning(
            ValidationIssue::new(
                "cache.similarity_threshold",
                format!(
                    "Similarity threshold {} is low; materially different queries may share answers",
                    threshold
                ),
            )
            .with_suggestion("Keep the threshold at 0.9 or above"),
        );
    }

    if config.cache.max_entries == 0 {
        result = result.with_error(ValidationIssue::new(
            "cache.max_entries",
            "Cache must retain at least one entry per namespace",
        ));
    }

    if config.cache.ttl.is_zero() {
        result = result.with_warning(ValidationIssue::new(
            "cache.ttl",
            "Zero TTL expires every entry immediately",
        ));
    }

    result
}

fn validate_retrieval_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let retrieval = &config.retrieval;

    let usable = |w: f32| w.is_finite() && w >= 0.0;
    if !usable(retrieval.lexical_weight) || !usable(retrieval.vector_weight) {
        result = result.with_error(ValidationIssue::new(
            "retrieval",
            "Fusion weights must be finite and not negative",
        ));
    }

    if retrieval.top_k == 0 {
        result = result.with_warning(ValidationIssue::new(
            "retrieval.top_k",
            "top_k of zero disables retrieval context",
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn keyed_config() -> Config {
        let mut config = Config::default();
        config.embedding.api_key = SecretString::from("sk-test");
        config
    }

    #[test]
    fn test_validate_default_config_requires_key() {
        let result = validate_config(&Config::default());
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.path == "embedding.api_key"));
    }

    #[test]
    fn test_validate_keyed_config() {
        let result = validate_config(&keyed_config());
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = keyed_config();
        config.cache.similarity_threshold = 1.5;
        assert!(!validate_config(&config).valid);

        config.cache.similarity_threshold = 0.5;
        let result = validate_config(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_fusion_weights_must_be_finite() {
        let mut config = keyed_config();
        config.retrieval.lexical_weight = f32::NAN;
        assert!(!validate_config(&config).valid);

        config.retrieval.lexical_weight = 0.4;
        config.retrieval.vector_weight = f32::INFINITY;
        assert!(!validate_config(&config).valid);

        config.retrieval.vector_weight = -0.1;
        assert!(!validate_config(&config).valid);

        config.retrieval.vector_weight = 0.6;
        assert!(validate_config(&config).valid);
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProviderKind::Local;
        config.embedding.dimensions = 384;
        assert!(validate_config(&config).valid);
    }
}
