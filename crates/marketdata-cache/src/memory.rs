//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::Utc;
use marketdata_core::{BarCache, BarKey, Result};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    cached_at: chrono::DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age >= chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// In-memory cache of raw backend bars.
///
/// Frames live in an `RwLock`-protected `HashMap` and are lost when the cache
/// is dropped. Frames are cloned on get/put; polars clones share buffers.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    bars: RwLock<HashMap<BarKey, CacheEntry<DataFrame>>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BarCache for InMemoryCache {
    #[instrument(skip(self), fields(code = %key.code, frequency = key.frequency))]
    async fn get(&self, key: &BarKey) -> Result<Option<DataFrame>> {
        let cache = self.bars.read().await;
        match cache.get(key) {
            Some(entry) => {
                debug!("Cache hit for raw bars");
                Ok(Some(entry.data.clone()))
            }
            None => {
                debug!("Cache miss for raw bars");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, key, data), fields(code = %key.code, rows = data.height()))]
    async fn put(&self, key: BarKey, data: &DataFrame) -> Result<()> {
        let mut cache = self.bars.write().await;
        cache.insert(key, CacheEntry::new(data.clone()));
        debug!("Cached {} raw bars", data.height());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let mut cache = self.bars.write().await;
        let before = cache.len();
        cache.retain(|_, entry| !entry.is_stale(ttl));
        let removed = before - cache.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<usize> {
        let mut cache = self.bars.write().await;
        let removed = cache.len();
        cache.clear();
        debug!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    async fn len(&self) -> usize {
        self.bars.read().await.len()
    }
}
