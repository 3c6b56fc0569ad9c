//! Serving pipeline
//!
//! Runs the cheapest-first decision path for one message: router, then
//! semantic cache, then retrieval. Generation itself happens outside; the
//! caller hands the response back through [`ServingPipeline::complete`].

use crate::memory::{HybridRetriever, SearchResult, SemanticCache};
use crate::router::{QueryRouter, RouteDecision};
use std::sync::Arc;
use tracing::{debug, warn};

use super::context::RequestContext;

/// What the caller should do with a message
#[derive(Debug, Clone)]
pub enum ServePlan {
    /// Send this canned reply; nothing else runs
    Instant { response: String },
    /// Send this previously cached response
    Cached {
        response: String,
        decision: RouteDecision,
    },
    /// Generate with the routed model, using `context` if non-empty
    Generate {
        decision: RouteDecision,
        context: Vec<SearchResult>,
    },
}

/// Router, cache and retriever wired together
#[derive(Clone)]
pub struct ServingPipeline {
    router: Arc<QueryRouter>,
    cache: Arc<SemanticCache>,
    retriever: Arc<HybridRetriever>,
}

impl ServingPipeline {
    /// Create a new pipeline
    pub fn new(
        router: Arc<QueryRouter>,
        cache: Arc<SemanticCache>,
        retriever: Arc<HybridRetriever>,
    ) -> Self {
        ServingPipeline {
            router,
            cache,
            retriever,
        }
    }

    /// Decide how to answer `ctx.message_text`.
    ///
    /// Storage faults never fail the request: a cache error is a miss and a
    /// retrieval error yields no context.
    pub async fn plan(&self, ctx: &RequestContext, has_url: bool) -> ServePlan {
        let text = ctx.message_text.as_str();
        let decision = self.router.route(text, has_url);

        if let Some(response) = decision.template_response.clone() {
            return ServePlan::Instant { response };
        }

        match self.cache.get(text, &ctx.namespace).await {
            Ok(Some(response)) => return ServePlan::Cached { response, decision },
            Ok(None) => {}
            Err(e) => warn!("Cache lookup failed in '{}', treating as miss: {}", ctx.namespace, e),
        }

        let context = if decision.needs_retrieval {
            match self
                .retriever
                .search(
                    text,
                    &ctx.namespace,
                    self.retriever.default_top_k(),
                    self.retriever.default_mode(),
                )
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    warn!("Retrieval failed in '{}', continuing without context: {}", ctx.namespace, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        debug!(
            "Plan for message {}: generate with {} ({} context chunks)",
            ctx.message_id,
            decision.tier,
            context.len()
        );

        ServePlan::Generate { decision, context }
    }

    /// Record a generated response so similar messages can reuse it.
    ///
    /// Skipped for instant replies and when `cacheable` is false (answers
    /// tied to one-off content such as a freshly fetched link). Returns
    /// whether the response was stored.
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        decision: &RouteDecision,
        response: &str,
        cacheable: bool,
    ) -> bool {
        if decision.is_instant() || !cacheable || response.trim().is_empty() {
            return false;
        }

        match self
            .cache
            .set(&ctx.message_text, response, &ctx.namespace)
            .await
        {
            Ok(stored) => stored.is_some(),
            Err(e) => {
                warn!("Failed to cache response in '{}': {}", ctx.namespace, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrievalConfig, RouterConfig, SemanticCacheConfig};
    use crate::database::testing::test_pool;
    use crate::database::{CacheEntryStore, ChunkStore, NewChunk, Pool, SourceKind};
    use crate::memory::provider::testing::StaticProvider;
    use crate::memory::EmbeddingService;
    use crate::router::{ComplexityTier, THANKS_REPLY};
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        pool: Pool,
        provider: Arc<StaticProvider>,
        retriever: Arc<HybridRetriever>,
        pipeline: ServingPipeline,
    }

    async fn harness() -> Harness {
        let (dir, pool) = test_pool().await;
        let provider = Arc::new(StaticProvider::new(32));
        let embedding = EmbeddingService::new(provider.clone(), "test-model");

        let retriever = Arc::new(HybridRetriever::new(
            ChunkStore::new(pool.clone()),
            embedding.clone(),
            &RetrievalConfig::default(),
        ));
        let cache = Arc::new(SemanticCache::new(
            CacheEntryStore::new(pool.clone()),
            embedding,
            SemanticCacheConfig::default(),
        ));
        let router = Arc::new(QueryRouter::new(RouterConfig::default()).unwrap());

        Harness {
            _dir: dir,
            pool,
            provider,
            retriever: retriever.clone(),
            pipeline: ServingPipeline::new(router, cache, retriever),
        }
    }

    fn message(namespace: &str, text: &str) -> RequestContext {
        RequestContext::new(namespace, "sam", 1, text)
    }

    #[tokio::test]
    async fn test_instant_short_circuits() {
        let h = harness().await;

        match h.pipeline.plan(&message("Health", "thanks!"), false).await {
            ServePlan::Instant { response } => assert_eq!(response, THANKS_REPLY),
            other => panic!("expected instant reply, got {:?}", other),
        }
        // No embedding work for instant replies
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_then_cached() {
        let h = harness().await;
        let ctx = message("Wealth", "should I rebalance my index funds");

        let decision = match h.pipeline.plan(&ctx, false).await {
            ServePlan::Generate { decision, context } => {
                assert!(context.is_empty());
                decision
            }
            other => panic!("expected generate, got {:?}", other),
        };
        assert_eq!(decision.tier, ComplexityTier::Powerful);

        assert!(h.pipeline.complete(&ctx, &decision, "Once a year is plenty.", true).await);

        match h.pipeline.plan(&ctx, false).await {
            ServePlan::Cached { response, decision } => {
                assert_eq!(response, "Once a year is plenty.");
                assert_eq!(decision.tier, ComplexityTier::Powerful);
            }
            other => panic!("expected cached, got {:?}", other),
        }

        // Other namespaces don't see it
        let elsewhere = message("Career", "should I rebalance my index funds");
        assert!(matches!(
            h.pipeline.plan(&elsewhere, false).await,
            ServePlan::Generate { .. }
        ));
    }

    #[tokio::test]
    async fn test_retrieval_context_when_flagged() {
        let h = harness().await;
        h.retriever
            .index(NewChunk::new(
                "Health",
                "magnesium glycinate before bed",
                SourceKind::ConversationMessage,
            ))
            .await
            .unwrap();

        let ctx = message("Health", "remember the magnesium thing");
        match h.pipeline.plan(&ctx, false).await {
            ServePlan::Generate { decision, context } => {
                assert!(decision.needs_retrieval);
                assert_eq!(context.len(), 1);
                assert!(context[0].content.contains("magnesium"));
            }
            other => panic!("expected generate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_respects_opt_out() {
        let h = harness().await;
        let ctx = message("Ideas", "summarize https://example.com/post");

        let decision = match h.pipeline.plan(&ctx, true).await {
            ServePlan::Generate { decision, .. } => decision,
            other => panic!("expected generate, got {:?}", other),
        };
        assert_eq!(decision.tier, ComplexityTier::Fast);

        assert!(!h.pipeline.complete(&ctx, &decision, "A summary.", false).await);
        assert_eq!(CacheEntryStore::new(h.pool.clone()).count("Ideas").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_storage_fault_degrades() {
        let h = harness().await;
        let ctx = message("Journal", "remember what I wrote yesterday");

        h.pool.close().await;

        match h.pipeline.plan(&ctx, false).await {
            ServePlan::Generate { decision, context } => {
                assert!(decision.needs_retrieval);
                assert!(context.is_empty());
            }
            other => panic!("expected generate, got {:?}", other),
        }

        assert!(!h.pipeline.complete(&ctx, &decision_for(&ctx), "ok", true).await);
    }

    fn decision_for(ctx: &RequestContext) -> RouteDecision {
        QueryRouter::new(RouterConfig::default())
            .unwrap()
            .route(&ctx.message_text, false)
    }
}
