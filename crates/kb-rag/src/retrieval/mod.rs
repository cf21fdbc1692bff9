//! Retrieval strategies, aggregation and caching

pub mod aggregator;
pub mod cache;
pub mod engine;
pub mod strategies;

pub use aggregator::{aggregate, fingerprint, sql_fingerprint};
pub use cache::{cache_key, CacheStats, StrategyCache};
pub use engine::{RetrievalEngine, Synthesis};
