//! Non-blocking processing lease per (source id, company id)

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

type LeaseKey = (String, i64);

/// Set of currently held leases
#[derive(Debug, Clone, Default)]
pub struct LeaseTable {
    held: Arc<DashMap<LeaseKey, DateTime<Utc>>>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease or fail immediately with `ConcurrentProcessing`
    pub fn try_acquire(&self, source_id: &str, company_id: i64) -> Result<LeaseGuard> {
        let key = (source_id.to_string(), company_id);
        match self.held.entry(key.clone()) {
            Entry::Occupied(held) => {
                tracing::warn!(
                    "Lease for '{}' / {} already held since {}",
                    source_id,
                    company_id,
                    held.get()
                );
                Err(Error::ConcurrentProcessing {
                    source_id: source_id.to_string(),
                    company_id,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Ok(LeaseGuard {
                    held: self.held.clone(),
                    key,
                })
            }
        }
    }

    pub fn is_held(&self, source_id: &str, company_id: i64) -> bool {
        self.held.contains_key(&(source_id.to_string(), company_id))
    }
}

/// Releases the lease on drop
#[derive(Debug)]
pub struct LeaseGuard {
    held: Arc<DashMap<LeaseKey, DateTime<Utc>>>,
    key: LeaseKey,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.held.remove(&self.key);
    }
}
