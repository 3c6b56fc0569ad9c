//! Memory module - embeddings, hybrid retrieval and the semantic cache
//!
//! Orchestrates embedding providers (OpenRouter or local fastembed) with
//! in-process memoization (moka), SQLite-backed BM25 + vector retrieval,
//! and a similarity-keyed response cache.

pub mod cache;
pub mod embedding;
pub mod fusion;
pub mod provider;
pub mod retrieval;
pub mod search_mode;
pub mod vector_index;

pub use cache::{CacheStats, SemanticCache};
pub use embedding::{batch_cosine_similarity, cosine_similarity, EmbeddingService};
pub use fusion::{reciprocal_rank_fusion, FusionWeights, RRF_K};
pub use provider::{build_provider, EmbeddingProvider, LocalEmbeddings, OpenRouterEmbeddings};
pub use retrieval::{format_context, HybridRetriever, RetrieverStats, SearchResult};
pub use search_mode::{select_mode, SearchMode};
pub use vector_index::VectorIndex;
