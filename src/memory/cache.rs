//! Semantic response cache
//!
//! Maps previously answered queries to their responses by embedding
//! similarity. Entries live in SQLite; each namespace's embeddings are loaded
//! into an in-memory index on first lookup.

use crate::config::SemanticCacheConfig;
use crate::database::{CacheEntryStore, EvictionPolicy};
use crate::error::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::embedding::{is_zero_vector, EmbeddingService};
use super::vector_index::VectorIndex;

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: i64,
    pub total_hits: i64,
    pub by_namespace: HashMap<String, i64>,
    /// Embeddings resident in memory across loaded namespaces
    pub vectors_in_memory: usize,
    pub similarity_threshold: f32,
    pub max_entries: usize,
    pub ttl_secs: u64,
}

/// Similarity-based response cache
#[derive(Clone)]
pub struct SemanticCache {
    store: CacheEntryStore,
    embedding: EmbeddingService,
    index: Arc<VectorIndex>,
    /// Serializes insert + evict against other writers in this process
    writes: Arc<Mutex<()>>,
    config: SemanticCacheConfig,
}

impl SemanticCache {
    /// Create a new cache
    pub fn new(store: CacheEntryStore, embedding: EmbeddingService, config: SemanticCacheConfig) -> Self {
        SemanticCache {
            store,
            embedding,
            index: Arc::new(VectorIndex::new()),
            writes: Arc::new(Mutex::new(())),
            config,
        }
    }

    /// Entries created before this instant are expired
    fn cutoff(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.config.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    async fn ensure_loaded(&self, namespace: &str) -> Result<()> {
        let store = self.store.clone();
        let ns = namespace.to_string();
        let cutoff = self.cutoff();

        self.index
            .ensure_loaded(namespace, || async move {
                store.load_live_embeddings(&ns, cutoff).await
            })
            .await
    }

    /// Look up a cached response for a query.
    ///
    /// Returns the response of the most similar entry if its similarity is at
    /// least the configured threshold. A hit bumps the entry's hit counter
    /// and last-hit time.
    pub async fn get(&self, query: &str, namespace: &str) -> Result<Option<String>> {
        self.ensure_loaded(namespace).await?;

        if self.index.len(namespace).await == 0 {
            return Ok(None);
        }

        let query_vector = self.embedding.embed_one(query).await;
        if is_zero_vector(&query_vector) {
            return Ok(None);
        }

        let threshold = self.config.similarity_threshold;
        let candidates = self.index.search(namespace, &query_vector, usize::MAX).await;
        let cutoff = self.cutoff();
        let mut stale = Vec::new();
        let mut hit = None;

        // Candidates arrive most similar first
        for (id, similarity) in candidates {
            if similarity < threshold {
                debug!(
                    "Cache miss in '{}': best live similarity {:.3} < {:.2}",
                    namespace, similarity, threshold
                );
                break;
            }
            // Evicted or expired since the index was loaded
            match self.store.live_response(id, cutoff).await? {
                Some(response) => {
                    hit = Some((id, similarity, response));
                    break;
                }
                None => stale.push(id),
            }
        }

        if !stale.is_empty() {
            self.index.remove(namespace, &stale).await;
        }

        let Some((id, similarity, response)) = hit else {
            return Ok(None);
        };

        self.store.record_hit(id).await?;

        info!(
            "Cache hit in '{}' (similarity: {:.3})",
            namespace, similarity
        );
        Ok(Some(response))
    }

    /// Cache a response for a query.
    ///
    /// Returns the new entry ID, or `None` when the query could not be
    /// embedded (such an entry could never be hit). If the insert evicted
    /// entries, every in-memory index is dropped and reloaded on next use.
    pub async fn set(&self, query: &str, response: &str, namespace: &str) -> Result<Option<i64>> {
        let embedding = self.embedding.embed_one(query).await;
        if is_zero_vector(&embedding) {
            warn!("Not caching response in '{}': query embedding unavailable", namespace);
            return Ok(None);
        }

        let policy = EvictionPolicy {
            max_entries: self.config.max_entries,
            headroom: self.config.eviction_headroom,
        };

        let _guard = self.writes.lock().await;

        let outcome = self
            .store
            .insert(namespace, query, response, &embedding, policy)
            .await?;

        if outcome.evicted.is_empty() {
            self.index.insert(namespace, outcome.id, embedding).await;
        } else {
            info!(
                "Evicted {} cache entries from '{}'",
                outcome.evicted.len(),
                namespace
            );
            self.index.invalidate_all().await;
        }

        debug!("Cached response {} in '{}'", outcome.id, namespace);
        Ok(Some(outcome.id))
    }

    /// Delete entries of one namespace, or of every namespace
    pub async fn invalidate(&self, namespace: Option<&str>) -> Result<u64> {
        let _guard = self.writes.lock().await;

        let deleted = self.store.delete(namespace).await?;
        match namespace {
            Some(ns) => self.index.invalidate(ns).await,
            None => self.index.invalidate_all().await,
        }

        info!(
            "Invalidated {} cache entries ({})",
            deleted,
            namespace.unwrap_or("all namespaces")
        );
        Ok(deleted)
    }

    /// Delete expired entries across all namespaces and drop every
    /// in-memory index
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let _guard = self.writes.lock().await;

        let deleted = self.store.delete_expired(self.cutoff()).await?;
        if deleted > 0 {
            self.index.invalidate_all().await;
            info!("Cleaned up {} expired cache entries", deleted);
        }

        Ok(deleted)
    }

    /// Entry, hit and in-memory counts
    pub async fn stats(&self) -> Result<CacheStats> {
        let entries = self.store.stats().await?;

        Ok(CacheStats {
            total_entries: entries.total_entries,
            total_hits: entries.total_hits,
            by_namespace: entries.by_namespace,
            vectors_in_memory: self.index.total_len().await,
            similarity_threshold: self.config.similarity_threshold,
            max_entries: self.config.max_entries,
            ttl_secs: self.config.ttl.as_secs(),
        })
    }
}
