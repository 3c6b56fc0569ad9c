//! Serving layer - request context, the cheapest-first pipeline and
//! knowledge indexing

mod context;
mod knowledge;
mod pipeline;

pub use context::RequestContext;
pub use knowledge::{ContentType, KnowledgeIndexer, Remembered, MAX_LINK_CONTENT_CHARS};
pub use pipeline::{ServePlan, ServingPipeline};
