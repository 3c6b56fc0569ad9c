//! Hybrid retriever
//!
//! Ties together the chunk store (SQLite + FTS5 BM25), the embedding service
//! and a per-namespace in-memory vector index, answering queries with
//! lexical-only or RRF-fused hybrid rankings.

use crate::config::RetrievalConfig;
use crate::database::{ChunkStore, Metadata, NewChunk, SourceKind};
use crate::error::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::embedding::{is_zero_vector, EmbeddingService};
use super::fusion::{reciprocal_rank_fusion, FusionWeights};
use super::search_mode::SearchMode;
use super::vector_index::VectorIndex;

/// One ranked chunk
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub content: String,
    pub namespace: String,
    /// BM25 score in fast mode, fused RRF score in hybrid mode
    pub score: f32,
    pub source_kind: SourceKind,
    pub source_locator: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Index statistics
#[derive(Debug, Clone, Serialize)]
pub struct RetrieverStats {
    /// Chunks in durable storage (within `namespace` if set)
    pub total_chunks: i64,
    /// Vectors currently resident in memory across all namespaces
    pub vectors_in_memory: usize,
    pub namespace: Option<String>,
}

/// Hybrid lexical + vector retrieval over namespaced chunks
#[derive(Clone)]
pub struct HybridRetriever {
    store: ChunkStore,
    embedding: EmbeddingService,
    vectors: Arc<VectorIndex>,
    weights: FusionWeights,
    rrf_k: u32,
    top_k: usize,
    default_mode: SearchMode,
}

impl HybridRetriever {
    /// Create a new retriever
    pub fn new(store: ChunkStore, embedding: EmbeddingService, config: &RetrievalConfig) -> Self {
        HybridRetriever {
            store,
            embedding,
            vectors: Arc::new(VectorIndex::new()),
            weights: FusionWeights {
                lexical: config.lexical_weight,
                vector: config.vector_weight,
            },
            rrf_k: config.rrf_k,
            top_k: config.top_k,
            default_mode: config.default_mode,
        }
    }

    /// Configured result count
    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Configured search mode
    pub fn default_mode(&self) -> SearchMode {
        self.default_mode
    }

    /// Index a chunk and return its ID.
    ///
    /// The chunk row and its FTS entry are written in one statement. If the
    /// embedding provider fails, the chunk is stored without an embedding
    /// and is found by lexical search only.
    pub async fn index(&self, chunk: NewChunk) -> Result<i64> {
        let embedding = self.embedding.embed_one(&chunk.content).await;
        let embedding = if is_zero_vector(&embedding) {
            warn!(
                "Indexing chunk in {} without embedding; vector search will skip it",
                chunk.namespace
            );
            None
        } else {
            Some(embedding)
        };

        let id = self.store.insert(&chunk, embedding.as_deref()).await?;

        if let Some(vector) = embedding {
            self.vectors.insert(&chunk.namespace, id, vector).await;
        }

        debug!("Indexed chunk {} to namespace '{}'", id, chunk.namespace);
        Ok(id)
    }

    /// Search a namespace.
    ///
    /// `Auto` is resolved per query. Fast mode never calls the embedding
    /// provider. Hybrid mode requests `2 * top_k` candidates from each
    /// ranking and fuses them.
    pub async fn search(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
        mode: SearchMode,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(vec![]);
        }

        let resolved = mode.resolve(query);

        let ranked = match resolved {
            SearchMode::Hybrid => {
                let candidates = top_k.saturating_mul(2);
                let lexical = self.store.search_lexical(namespace, query, candidates).await?;
                let vector = self.vector_search(query, namespace, candidates).await?;

                let mut fused = reciprocal_rank_fusion(&lexical, &vector, self.weights, self.rrf_k);
                fused.truncate(top_k);
                fused
            }
            _ => self.store.search_lexical(namespace, query, top_k).await?,
        };

        let results = self.hydrate(ranked).await?;

        debug!(
            "{} search: {} results in '{}' for '{}'",
            resolved,
            results.len(),
            namespace,
            query.chars().take(30).collect::<String>()
        );

        Ok(results)
    }

    /// Vector ranking for a query; empty when the namespace has no vectors
    /// or the query could not be embedded.
    async fn vector_search(
        &self,
        query: &str,
        namespace: &str,
        limit: usize,
    ) -> Result<Vec<(i64, f32)>> {
        let store = self.store.clone();
        let ns = namespace.to_string();
        self.vectors
            .ensure_loaded(namespace, || async move { store.load_embeddings(&ns).await })
            .await?;

        if self.vectors.len(namespace).await == 0 {
            return Ok(vec![]);
        }

        let query_vector = self.embedding.embed_one(query).await;
        if is_zero_vector(&query_vector) {
            warn!("Query embedding unavailable; falling back to lexical ranking");
            return Ok(vec![]);
        }

        Ok(self.vectors.search(namespace, &query_vector, limit).await)
    }

    /// Fetch chunk rows for ranked IDs, keeping rank order
    async fn hydrate(&self, ranked: Vec<(i64, f32)>) -> Result<Vec<SearchResult>> {
        let ids: Vec<i64> = ranked.iter().map(|(id, _)| *id).collect();
        let mut chunks = self.store.get_many(&ids).await?;

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                chunks.remove(&id).map(|chunk| SearchResult {
                    chunk_id: chunk.id,
                    content: chunk.content,
                    namespace: chunk.namespace,
                    score,
                    source_kind: chunk.source_kind,
                    source_locator: chunk.source_locator,
                    metadata: chunk.metadata,
                })
            })
            .collect())
    }

    /// Delete every chunk in a namespace and drop its in-memory vectors
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<u64> {
        let deleted = self.store.delete_namespace(namespace).await?;
        self.vectors.invalidate(namespace).await;

        info!("Invalidated {} chunks in namespace '{}'", deleted, namespace);
        Ok(deleted)
    }

    /// Chunk and vector counts
    pub async fn stats(&self, namespace: Option<&str>) -> Result<RetrieverStats> {
        Ok(RetrieverStats {
            total_chunks: self.store.count(namespace).await?,
            vectors_in_memory: self.vectors.total_len().await,
            namespace: namespace.map(String::from),
        })
    }
}

/// Format search results into a context block for the generation prompt
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut output = String::from("\n\n---\n\n## Relevant Knowledge\n\n");

    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!("{}. {}", i + 1, result.content));
        if let Some(locator) = &result.source_locator {
            output.push_str(&format!(" (source: {})", locator));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::test_pool;
    use crate::memory::provider::testing::StaticProvider;
    use tempfile::TempDir;

    async fn retriever_with(provider: Arc<StaticProvider>) -> (TempDir, HybridRetriever) {
        let (dir, pool) = test_pool().await;
        let retriever = HybridRetriever::new(
            ChunkStore::new(pool),
            EmbeddingService::new(provider, "test-model"),
            &RetrievalConfig::default(),
        );
        (dir, retriever)
    }

    fn message(namespace: &str, content: &str) -> NewChunk {
        NewChunk::new(namespace, content, SourceKind::ConversationMessage)
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_format_context() {
        let results = vec![
            SearchResult {
                chunk_id: 1,
                content: "First chunk".into(),
                namespace: "Ideas".into(),
                score: 0.5,
                source_kind: SourceKind::ExternalLink,
                source_locator: Some("https://example.com".into()),
                metadata: None,
            },
            SearchResult {
                chunk_id: 2,
                content: "Second chunk".into(),
                namespace: "Ideas".into(),
                score: 0.4,
                source_kind: SourceKind::ConversationMessage,
                source_locator: None,
                metadata: None,
            },
        ];

        let context = format_context(&results);
        assert!(context.contains("## Relevant Knowledge"));
        assert!(context.contains("1. First chunk (source: https://example.com)"));
        assert!(context.contains("2. Second chunk\n"));
    }

    #[tokio::test]
    async fn test_index_then_search_sees_new_chunk() {
        let provider = Arc::new(StaticProvider::new(32));
        let (_dir, retriever) = retriever_with(provider).await;

        retriever
            .index(message("Health", "morning runs improve sleep quality"))
            .await
            .unwrap();

        // Loads the namespace
        let hits = retriever
            .search("sleep", "Health", 5, SearchMode::Hybrid)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        // Indexed after load: visible immediately through both rankings
        let id = retriever
            .index(message("Health", "magnesium before bed helps sleep"))
            .await
            .unwrap();
        let hits = retriever
            .search("magnesium", "Health", 5, SearchMode::Hybrid)
            .await
            .unwrap();
        assert_eq!(hits[0].chunk_id, id);
        assert_eq!(retriever.stats(None).await.unwrap().vectors_in_memory, 2);
    }

    #[tokio::test]
    async fn test_fast_mode_skips_embedding() {
        let provider = Arc::new(StaticProvider::new(32));
        let (_dir, retriever) = retriever_with(provider.clone()).await;

        retriever
            .index(message("Wealth", "index funds have low fees"))
            .await
            .unwrap();
        let calls = provider.calls();

        let hits = retriever
            .search("index funds", "Wealth", 5, SearchMode::Fast)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);
        assert_eq!(provider.calls(), calls);
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let provider = Arc::new(StaticProvider::new(32));
        let (_dir, retriever) = retriever_with(provider).await;

        retriever
            .index(message("Career", "negotiate salary with data"))
            .await
            .unwrap();

        for mode in [SearchMode::Fast, SearchMode::Hybrid, SearchMode::Auto] {
            let hits = retriever.search("salary", "Wealth", 5, mode).await.unwrap();
            assert!(hits.is_empty(), "leaked across namespaces in {} mode", mode);
        }
    }

    #[tokio::test]
    async fn test_reindex_yields_distinct_ids() {
        let provider = Arc::new(StaticProvider::new(32));
        let (_dir, retriever) = retriever_with(provider).await;

        let a = retriever.index(message("Ideas", "a budgeting app")).await.unwrap();
        let b = retriever.index(message("Ideas", "a budgeting app")).await.unwrap();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(retriever.stats(Some("Ideas")).await.unwrap().total_chunks, 2);
    }

    #[tokio::test]
    async fn test_hybrid_fuses_rankings() {
        // The vector ranking prefers "beta" while the lexical ranking only
        // matches "alpha"; both must appear in the fused list.
        let provider = Arc::new(
            StaticProvider::new(2)
                .pin("alpha notes on saving", vec![0.0, 1.0])
                .pin("beta thoughts", vec![1.0, 0.0])
                .pin("saving", vec![1.0, 0.1]),
        );
        let (_dir, retriever) = retriever_with(provider).await;

        let alpha = retriever
            .index(message("Wealth", "alpha notes on saving"))
            .await
            .unwrap();
        let beta = retriever.index(message("Wealth", "beta thoughts")).await.unwrap();

        let hits = retriever
            .search("saving", "Wealth", 5, SearchMode::Hybrid)
            .await
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.chunk_id).collect();

        // alpha: 0.4/61 + 0.6/62, beta: 0.6/61
        assert_eq!(ids, vec![alpha, beta]);
        assert!(hits[0].score > hits[1].score);

        let top_one = retriever
            .search("saving", "Wealth", 1, SearchMode::Hybrid)
            .await
            .unwrap();
        // Needs both candidate windows to reach rank 2; beta wins with only 1
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].chunk_id, alpha);

        let everything = retriever
            .search("saving", "Wealth", usize::MAX, SearchMode::Hybrid)
            .await
            .unwrap();
        assert_eq!(everything.len(), 2);
    }

    #[tokio::test]
    async fn test_hybrid_with_empty_vectors_is_lexical() {
        let provider = Arc::new(StaticProvider::new(32));
        let (_dir, retriever) = retriever_with(provider.clone()).await;

        // Stored without embeddings
        provider.set_failing(true);
        let first = retriever
            .index(message("Journal", "long walk by the river"))
            .await
            .unwrap();
        let second = retriever
            .index(message("Journal", "river cleanup volunteering walk"))
            .await
            .unwrap();

        let fast = retriever
            .search("river walk", "Journal", 5, SearchMode::Fast)
            .await
            .unwrap();
        let hybrid = retriever
            .search("river walk", "Journal", 5, SearchMode::Hybrid)
            .await
            .unwrap();

        let fast_ids: Vec<i64> = fast.iter().map(|h| h.chunk_id).collect();
        let hybrid_ids: Vec<i64> = hybrid.iter().map(|h| h.chunk_id).collect();
        assert_eq!(fast_ids.len(), 2);
        assert!(fast_ids.contains(&first) && fast_ids.contains(&second));
        assert_eq!(fast_ids, hybrid_ids);
    }

    #[tokio::test]
    async fn test_provider_failure_at_query_time_degrades() {
        let provider = Arc::new(StaticProvider::new(32));
        let (_dir, retriever) = retriever_with(provider.clone()).await;

        retriever
            .index(message("Rants", "the bus was late again"))
            .await
            .unwrap();

        provider.set_failing(true);
        let hits = retriever
            .search("why is the bus always late", "Rants", 5, SearchMode::Auto)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_namespace() {
        let provider = Arc::new(StaticProvider::new(32));
        let (_dir, retriever) = retriever_with(provider).await;

        retriever.index(message("Goals", "run a marathon")).await.unwrap();
        retriever.index(message("Ideas", "marathon training app")).await.unwrap();
        retriever
            .search("marathon", "Goals", 5, SearchMode::Hybrid)
            .await
            .unwrap();

        assert_eq!(retriever.invalidate_namespace("Goals").await.unwrap(), 1);
        assert!(retriever
            .search("marathon", "Goals", 5, SearchMode::Hybrid)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            retriever
                .search("marathon", "Ideas", 5, SearchMode::Fast)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
