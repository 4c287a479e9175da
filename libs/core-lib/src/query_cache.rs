//! Read cache keyed by (table, tenant, filters).
//!
//! Each (table, tenant) pair carries a generation number that is part of
//! every key. Invalidation bumps the generation, which orphans all cached
//! reads for that pair at once; orphaned entries age out with the staleness
//! window. A reader takes its [`QueryKey`] before touching the store and
//! writes back under that same key, so rows fetched across an invalidation
//! land in the orphaned generation.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::tenant::TenantId;
use crate::store::Table;
use crate::Cache;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// Cache key pinned to the generation current when it was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone)]
pub struct QueryCache {
    cache: Arc<dyn Cache>,
    generations: Arc<DashMap<(Table, TenantId), u64>>,
    stale_after: Duration,
}

impl QueryCache {
    pub fn new(cache: Arc<dyn Cache>, stale_after: Duration) -> Self {
        Self {
            cache,
            generations: Arc::new(DashMap::new()),
            stale_after,
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    fn generation(&self, table: Table, tenant: &TenantId) -> u64 {
        self.generations
            .get(&(table, tenant.clone()))
            .map(|g| *g)
            .unwrap_or(0)
    }

    pub fn key(&self, table: Table, tenant: &TenantId, fragment: &str) -> QueryKey {
        QueryKey(format!(
            "q:v1:{}:{}:g{}:{}",
            table,
            tenant,
            self.generation(table, tenant),
            fragment
        ))
    }

    /// Cached value, or `None` on a miss. Cache and decode failures count as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let key = key.as_str();
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    debug!(%key, "Query cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(%key, "Discarding undecodable cache entry: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%key, "Query cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &QueryKey, value: &T) {
        let key = key.as_str();
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%key, "Failed to serialize query result: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(key, &bytes, Some(self.stale_after.as_secs().max(1)))
            .await
        {
            warn!(%key, "Query cache write failed: {}", e);
        }
    }

    pub fn invalidate(&self, table: Table, tenant: &TenantId) {
        let mut generation = self.generations.entry((table, tenant.clone())).or_insert(0);
        *generation += 1;
        debug!(%table, %tenant, generation = *generation, "Invalidated cached queries");
    }

    pub fn invalidate_tenant(&self, tenant: &TenantId) {
        for table in Table::ALL {
            self.invalidate(table, tenant);
        }
    }
}
