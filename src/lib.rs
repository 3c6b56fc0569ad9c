//! # fastpath
//!
//! A latency- and cost-aware serving layer for a multi-topic conversational
//! assistant, built with Rust.
//!
//! ## Features
//!
//! - **Query Router:** Zero-I/O pattern routing to instant replies or a model tier
//! - **Semantic Cache:** Reuses answers to similar questions, per namespace
//! - **Hybrid Retrieval:** SQLite FTS5 BM25 fused with in-memory vector search (RRF)
//! - **Pluggable Embeddings:** OpenRouter or local fastembed, memoized in-process
//!
//! ```no_run
//! use std::sync::Arc;
//! use fastpath::database::{self, CacheEntryStore, ChunkStore};
//! use fastpath::memory::{EmbeddingService, HybridRetriever, SemanticCache};
//! use fastpath::router::QueryRouter;
//! use fastpath::serving::{RequestContext, ServePlan, ServingPipeline};
//!
//! # async fn run() -> fastpath::Result<()> {
//! let config = fastpath::Config::from_env()?;
//! fastpath::logging::init(&config.log);
//!
//! let pool = database::init_pool(&config.storage).await?;
//! database::migrations::run(&pool).await?;
//!
//! let embedding = EmbeddingService::from_config(&config.embedding)?;
//! let pipeline = ServingPipeline::new(
//!     Arc::new(QueryRouter::new(config.router.clone())?),
//!     Arc::new(SemanticCache::new(CacheEntryStore::new(pool.clone()), embedding.clone(), config.cache.clone())),
//!     Arc::new(HybridRetriever::new(ChunkStore::new(pool), embedding, &config.retrieval)),
//! );
//!
//! let ctx = RequestContext::new("Health", "sam", 1, "what did I say about sleep?");
//! if let ServePlan::Generate { decision, .. } = pipeline.plan(&ctx, false).await {
//!     // generate with decision.model and the retrieved context, then:
//!     pipeline.complete(&ctx, &decision, "...", true).await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod memory;
pub mod router;
pub mod serving;

pub use config::Config;
pub use error::{Error, Result};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
