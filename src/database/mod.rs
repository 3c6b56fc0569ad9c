//! Database module - SQLite + FTS5
//!
//! Durable storage for:
//! - Knowledge chunks, with an FTS5 index kept in sync by triggers
//! - Semantic cache entries, each carrying its query embedding

mod cache_entries;
mod chunks;
mod sqlite;

pub use cache_entries::{CacheEntry, CacheEntryStats, CacheEntryStore, EvictionPolicy, InsertOutcome};
pub use chunks::{Chunk, ChunkStore, Metadata, NewChunk, SourceKind};
pub use sqlite::{init_pool, migrations, Pool};

#[cfg(test)]
pub(crate) use sqlite::testing;
