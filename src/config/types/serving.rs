//! Serving configuration types
//!
//! Tunables for the semantic cache, hybrid retrieval and the query router.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::memory::SearchMode;

/// Semantic cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Minimum cosine similarity for a hit
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
    /// Maximum entries retained per namespace
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Extra entries removed per eviction pass
    #[serde(default = "default_headroom")]
    pub eviction_headroom: usize,
    /// Entry time-to-live
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        SemanticCacheConfig {
            similarity_threshold: default_threshold(),
            max_entries: default_max_entries(),
            eviction_headroom: default_headroom(),
            ttl: default_ttl(),
        }
    }
}

fn default_threshold() -> f32 {
    0.92
}

fn default_max_entries() -> usize {
    1000
}

fn default_headroom() -> usize {
    10
}

fn default_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// RRF weight of the lexical list
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
    /// RRF weight of the vector list
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    /// RRF smoothing constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    /// Mode used by the serving pipeline
    #[serde(default)]
    pub default_mode: SearchMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            top_k: default_top_k(),
            lexical_weight: default_lexical_weight(),
            vector_weight: default_vector_weight(),
            rrf_k: default_rrf_k(),
            default_mode: SearchMode::default(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_lexical_weight() -> f32 {
    0.4
}

fn default_vector_weight() -> f32 {
    0.6
}

fn default_rrf_k() -> u32 {
    60
}

/// Model names per routing tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Lightweight model (URL summaries, simple lookups)
    #[serde(default = "default_model")]
    pub fast_model: String,
    /// Default model
    #[serde(default = "default_model")]
    pub balanced_model: String,
    /// Model for complex reasoning
    #[serde(default = "default_model")]
    pub powerful_model: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            fast_model: default_model(),
            balanced_model: default_model(),
            powerful_model: default_model(),
        }
    }
}

fn default_model() -> String {
    "minimax/minimax-m2.1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_defaults() {
        let config = SemanticCacheConfig::default();
        assert_eq!(config.similarity_threshold, 0.92);
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.eviction_headroom, 10);
        assert_eq!(config.ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn test_ttl_humantime() {
        let config: SemanticCacheConfig = toml::from_str("ttl = \"2h\"").unwrap();
        assert_eq!(config.ttl, Duration::from_secs(7200));
        assert_eq!(config.max_entries, 1000);
    }

    #[test]
    fn test_retrieval_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.rrf_k, 60);
        assert_eq!(config.default_mode, SearchMode::Auto);
    }
}
