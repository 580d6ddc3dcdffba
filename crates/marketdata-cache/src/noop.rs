//! No-op cache implementation.

use async_trait::async_trait;
use marketdata_core::{BarCache, BarKey, Result};
use polars::prelude::DataFrame;
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `get` always returns `Ok(None)` and `put` always returns `Ok(())`.
/// Selected when a provider is configured with caching disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BarCache for NoopCache {
    async fn get(&self, _key: &BarKey) -> Result<Option<DataFrame>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn put(&self, _key: BarKey, _data: &DataFrame) -> Result<()> {
        trace!("NoopCache: put called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self, _ttl: Duration) -> Result<usize> {
        Ok(0)
    }

    async fn clear(&self) -> Result<usize> {
        Ok(0)
    }

    async fn len(&self) -> usize {
        0
    }
}
