//! Embedding service with per-process memoization
//!
//! Wraps an [`EmbeddingProvider`] and remembers every vector it has produced,
//! keyed by `(model, text)`, so repeated texts never hit the provider twice.
//! Provider failures degrade to zero vectors of the configured dimension.

use crate::config::EmbeddingConfig;
use crate::error::Result;
use crate::memory::provider::{build_provider, EmbeddingProvider};
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Memoizing front-end over an embedding provider
#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    model: String,
    dimensions: usize,
    /// (model, text) -> vector
    memo: Cache<(String, String), Vec<f32>>,
}

impl EmbeddingService {
    /// Wrap a provider; `model` is passed through on every call
    pub fn new(provider: Arc<dyn EmbeddingProvider>, model: impl Into<String>) -> Self {
        let dimensions = provider.dimensions();

        EmbeddingService {
            provider,
            model: model.into(),
            dimensions,
            memo: Cache::builder().build(),
        }
    }

    /// Build the configured provider and wrap it
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let provider = build_provider(config)?;
        debug!(
            "Embedding provider: {} ({} dims, model={})",
            provider.name(),
            provider.dimensions(),
            config.model
        );
        Ok(Self::new(provider, config.model.clone()))
    }

    /// Embed texts with the default model. See [`Self::embed_with_model`].
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.embed_with_model(texts, &self.model).await
    }

    /// Embed texts, returning one vector per input in input order.
    ///
    /// Only texts missing from the memo are sent to the provider, each at
    /// most once per call. If the provider fails or returns the wrong number
    /// of vectors, the missing positions become zero vectors and nothing is
    /// memoized, so a later call retries them.
    pub async fn embed_with_model(&self, texts: &[String], model: &str) -> Vec<Vec<f32>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut pending: Vec<String> = Vec::new();
        let mut pending_slots: HashMap<&str, Vec<usize>> = HashMap::new();

        for (i, text) in texts.iter().enumerate() {
            match self.memo.get(&(model.to_string(), text.clone())).await {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    let slots = pending_slots.entry(text.as_str()).or_default();
                    if slots.is_empty() {
                        pending.push(text.clone());
                    }
                    slots.push(i);
                }
            }
        }

        if !pending.is_empty() {
            debug!(
                "Embedding {} of {} texts ({} memoized)",
                pending.len(),
                texts.len(),
                texts.len() - pending_slots.values().map(Vec::len).sum::<usize>()
            );

            match self.provider.embed(pending.clone(), model).await {
                Ok(vectors) if vectors.len() == pending.len() => {
                    for (text, vector) in pending.into_iter().zip(vectors) {
                        if let Some(slots) = pending_slots.get(text.as_str()) {
                            for &slot in slots {
                                results[slot] = Some(vector.clone());
                            }
                        }
                        self.memo.insert((model.to_string(), text), vector).await;
                    }
                }
                Ok(vectors) => {
                    error!(
                        "Embedding provider {} returned {} vectors for {} texts",
                        self.provider.name(),
                        vectors.len(),
                        pending.len()
                    );
                }
                Err(e) => {
                    error!("Embedding provider {} failed: {}", self.provider.name(), e);
                }
            }
        }

        results
            .into_iter()
            .map(|v| v.unwrap_or_else(|| vec![0.0; self.dimensions]))
            .collect()
    }

    /// Embed a single text with the default model
    pub async fn embed_one(&self, text: &str) -> Vec<f32> {
        self.embed(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| vec![0.0; self.dimensions])
    }

    /// Drop every memoized vector
    pub async fn clear_cache(&self) {
        self.memo.invalidate_all();
        self.memo.run_pending_tasks().await;
    }

    /// Number of memoized vectors
    pub async fn cached_count(&self) -> u64 {
        self.memo.run_pending_tasks().await;
        self.memo.entry_count()
    }

    /// Vector dimension
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Default model name
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// True when every component is zero, i.e. the provider fallback
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Cosine similarity. Zero-norm or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

/// Cosine similarity of `query` against each row, computing the query norm once
pub fn batch_cosine_similarity<R>(query: &[f32], rows: impl IntoIterator<Item = R>) -> Vec<f32>
where
    R: AsRef<[f32]>,
{
    let query_norm = norm(query);

    rows.into_iter()
        .map(|row| {
            let row = row.as_ref();
            if query_norm == 0.0 || row.len() != query.len() {
                return 0.0;
            }
            let row_norm = norm(row);
            if row_norm == 0.0 {
                0.0
            } else {
                dot(query, row) / (query_norm * row_norm)
            }
        })
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
