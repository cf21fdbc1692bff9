//! TTL cache for strategy results
//!
//! Entries are keyed on the normalized query, result count, strategy name
//! and any extra parameters (always including the knowledge source id).
//! There is no size-based eviction; stale entries are recomputed on access
//! and can be swept with `purge_expired`.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::types::{StrategyKind, StrategyResult};

use super::aggregator::normalize;

/// Build a cache key from query parameters
pub fn cache_key(query: &str, k: usize, strategy: StrategyKind, extra: &[(&str, &str)]) -> String {
    let mut params: Vec<(&str, &str)> = extra.to_vec();
    params.sort_by(|a, b| a.0.cmp(b.0));

    let mut parts = vec![normalize(query), k.to_string(), strategy.as_str().to_string()];
    parts.extend(params.iter().map(|(name, value)| format!("{}:{}", name, value)));

    hex::encode(Sha256::digest(parts.join("::").as_bytes()))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: Arc<StrategyResult>,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) < ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Shared strategy result cache
pub struct StrategyCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StrategyCache {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            entries: DashMap::new(),
            ttl: config.ttl()?,
            enabled: config.enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Fresh result for the key, if any
    pub fn get(&self, key: &str) -> Option<Arc<StrategyResult>> {
        if !self.enabled {
            return None;
        }

        let now = Utc::now();
        let fresh = self
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.result.clone());

        match fresh {
            Some(result) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit: {}", &key[..12.min(key.len())]);
                Some(result)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache miss: {}", &key[..12.min(key.len())]);
                None
            }
        }
    }

    /// Store a result; degraded results are returned but not stored
    pub fn put(&self, key: String, result: StrategyResult) -> Arc<StrategyResult> {
        let result = Arc::new(result);
        if self.enabled && !result.degraded {
            self.entries.insert(
                key,
                CacheEntry {
                    result: result.clone(),
                    created_at: Utc::now(),
                },
            );
        }
        result
    }

    /// Return the fresh entry or compute, store and return a new one
    pub async fn get_or_compute<F, Fut>(&self, key: String, compute: F) -> Result<Arc<StrategyResult>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StrategyResult>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let result = compute().await?;
        Ok(self.put(key, result))
    }

    /// Remove every stale entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            tracing::info!("Purged {} expired cache entries", purged);
        }
        purged
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
