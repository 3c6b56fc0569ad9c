//! In-memory per-namespace vector index
//!
//! Each namespace is loaded from storage at most once per process, on first
//! use, behind a double-checked load guard. Mutations take the same guard, so
//! a write can never be lost to a concurrent load.

use crate::error::Result;
use crate::memory::embedding::batch_cosine_similarity;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Default)]
struct IndexState {
    /// namespace -> id -> vector (ids iterate in insertion order)
    namespaces: HashMap<String, BTreeMap<i64, Vec<f32>>>,
    loaded: HashSet<String>,
}

/// Vectors for similarity search, partitioned by namespace
#[derive(Default)]
pub struct VectorIndex {
    state: RwLock<IndexState>,
    mutation: Mutex<()>,
}

impl VectorIndex {
    /// Create an empty index with nothing loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a namespace has been loaded from storage
    pub async fn is_loaded(&self, namespace: &str) -> bool {
        self.state.read().await.loaded.contains(namespace)
    }

    /// Load a namespace with `load` unless it is already loaded.
    ///
    /// Concurrent callers for an unloaded namespace run `load` once; the rest
    /// wait and then see the loaded state.
    pub async fn ensure_loaded<F, Fut>(&self, namespace: &str, load: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<(i64, Vec<f32>)>>>,
    {
        if self.is_loaded(namespace).await {
            return Ok(());
        }

        let _guard = self.mutation.lock().await;

        if self.is_loaded(namespace).await {
            return Ok(());
        }

        let rows = load().await?;
        let count = rows.len();

        let mut state = self.state.write().await;
        state
            .namespaces
            .insert(namespace.to_string(), rows.into_iter().collect());
        state.loaded.insert(namespace.to_string());

        debug!("Loaded {} vectors for namespace {}", count, namespace);
        Ok(())
    }

    /// Add a vector. Ignored while the namespace is unloaded, since the next
    /// load reads it from storage.
    pub async fn insert(&self, namespace: &str, id: i64, vector: Vec<f32>) {
        let _guard = self.mutation.lock().await;
        let mut state = self.state.write().await;

        if !state.loaded.contains(namespace) {
            return;
        }

        state
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(id, vector);
    }

    /// Drop specific vectors
    pub async fn remove(&self, namespace: &str, ids: &[i64]) {
        if ids.is_empty() {
            return;
        }

        let _guard = self.mutation.lock().await;
        let mut state = self.state.write().await;

        if let Some(vectors) = state.namespaces.get_mut(namespace) {
            for id in ids {
                vectors.remove(id);
            }
        }
    }

    /// Forget a namespace; the next use reloads it
    pub async fn invalidate(&self, namespace: &str) {
        let _guard = self.mutation.lock().await;
        let mut state = self.state.write().await;

        state.namespaces.remove(namespace);
        state.loaded.remove(namespace);
    }

    /// Forget every namespace
    pub async fn invalidate_all(&self) {
        let _guard = self.mutation.lock().await;
        let mut state = self.state.write().await;

        state.namespaces.clear();
        state.loaded.clear();
    }

    /// Vectors held for one namespace
    pub async fn len(&self, namespace: &str) -> usize {
        self.state
            .read()
            .await
            .namespaces
            .get(namespace)
            .map_or(0, BTreeMap::len)
    }

    /// Vectors held across all namespaces
    pub async fn total_len(&self) -> usize {
        self.state
            .read()
            .await
            .namespaces
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    /// Top `limit` ids by cosine similarity, best first. Equal scores keep
    /// id order.
    pub async fn search(&self, namespace: &str, query: &[f32], limit: usize) -> Vec<(i64, f32)> {
        let state = self.state.read().await;
        let Some(vectors) = state.namespaces.get(namespace) else {
            return vec![];
        };

        let scores = batch_cosine_similarity(query, vectors.values());
        let mut ranked: Vec<(i64, f32)> = vectors.keys().copied().zip(scores).collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }

    /// Single most similar id
    pub async fn best_match(&self, namespace: &str, query: &[f32]) -> Option<(i64, f32)> {
        self.search(namespace, query, 1).await.into_iter().next()
    }
}
