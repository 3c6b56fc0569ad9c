//! Embedding providers
//!
//! - `OpenRouterEmbeddings`: OpenAI-compatible `/embeddings` endpoint
//! - `LocalEmbeddings`: fastembed multilingual-e5-small (384 dimensions),
//!   auto-downloads on first use

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Something that turns texts into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Vector dimension produced by this provider
    fn dimensions(&self) -> usize;

    /// Embed `texts` with `model`, returning one vector per input in order
    async fn embed(&self, texts: Vec<String>, model: &str) -> Result<Vec<Vec<f32>>>;
}

/// Build the provider selected in config
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::OpenRouter => Ok(Arc::new(OpenRouterEmbeddings::new(config)?)),
        EmbeddingProviderKind::Local => Ok(Arc::new(LocalEmbeddings::new()?)),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// OpenAI-compatible embeddings over HTTP
pub struct OpenRouterEmbeddings {
    client: Client,
    base_url: String,
    dimensions: usize,
}

impl OpenRouterEmbeddings {
    /// Create a new client
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OpenRouterEmbeddings {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenRouterEmbeddings {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: Vec<String>, model: &str) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        debug!("Requesting {} embeddings: model={}", texts.len(), model);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model,
                input: &texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("API error ({}): {}", status, error_text)));
        }

        let mut body: EmbeddingResponse = response.json().await?;
        body.data.sort_by_key(|d| d.index);

        if body.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Local embedding service wrapping fastembed
#[derive(Clone)]
pub struct LocalEmbeddings {
    model: Arc<TextEmbedding>,
}

impl LocalEmbeddings {
    /// Create a new local provider with multilingual-e5-small
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::MultilingualE5Small).with_show_download_progress(true),
        )
        .map_err(|e| Error::Embedding(format!("Failed to init embedding model: {}", e)))?;

        Ok(LocalEmbeddings {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    fn name(&self) -> &str {
        "fastembed"
    }

    fn dimensions(&self) -> usize {
        384
    }

    // The model is fixed at construction; `model` only scopes memoization.
    async fn embed(&self, texts: Vec<String>, _model: &str) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();

        tokio::task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| Error::Embedding(format!("Batch embedding error: {}", e)))
        })
        .await
        .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))?
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic providers for tests

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Returns pinned vectors for known texts and a hashed bag-of-words
    /// vector for everything else.
    pub(crate) struct StaticProvider {
        dims: usize,
        pinned: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
        texts_sent: AtomicUsize,
        failing: AtomicBool,
    }

    impl StaticProvider {
        pub(crate) fn new(dims: usize) -> Self {
            StaticProvider {
                dims,
                pinned: HashMap::new(),
                calls: AtomicUsize::new(0),
                texts_sent: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }

        pub(crate) fn pin(mut self, text: &str, vector: Vec<f32>) -> Self {
            assert_eq!(vector.len(), self.dims);
            self.pinned.insert(text.to_string(), vector);
            self
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn texts_sent(&self) -> usize {
            self.texts_sent.load(Ordering::SeqCst)
        }

        fn bag_of_words(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0.0; self.dims];
            for token in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                // FNV-1a keeps buckets stable across runs
                let mut hash: u64 = 0xcbf29ce484222325;
                for byte in token.to_lowercase().bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(0x100000001b3);
                }
                vector[(hash % self.dims as u64) as usize] += 1.0;
            }
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        async fn embed(&self, texts: Vec<String>, _model: &str) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts_sent.fetch_add(texts.len(), Ordering::SeqCst);

            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Embedding("provider unavailable".into()));
            }

            Ok(texts
                .iter()
                .map(|t| {
                    self.pinned
                        .get(t)
                        .cloned()
                        .unwrap_or_else(|| self.bag_of_words(t))
                })
                .collect())
        }
    }
}
