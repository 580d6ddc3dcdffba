//! Cache trait for raw backend bars.
//!
//! This module defines the [`BarCache`] trait. Online quotation fetches are
//! slow and paged by count rather than by date, so the same raw window is
//! typically requested many times while a caller walks through a date range;
//! caching the raw frame under its fetch parameters avoids the repeat calls.

use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::fmt::Debug;
use std::time::Duration;

use crate::error::Result;

/// Parameters that identify one raw bar fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BarKey {
    /// Bare code as sent to the backend.
    pub code: String,
    /// Backend frequency code.
    pub frequency: u8,
    /// Number of bars requested.
    pub offset: usize,
    /// Backend adjustment token.
    pub adjust: String,
    /// Whether the index query path was used.
    pub is_index: bool,
}

impl BarKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        frequency: u8,
        offset: usize,
        adjust: impl Into<String>,
        is_index: bool,
    ) -> Self {
        Self {
            code: code.into(),
            frequency,
            offset,
            adjust: adjust.into(),
            is_index,
        }
    }
}

/// Trait for caching raw backend bars.
///
/// Implementations must be safe to share between providers: the factory
/// keeps one cache alive across provider switches.
#[async_trait]
pub trait BarCache: Send + Sync + Debug {
    /// Returns a copy of the cached frame, or `Ok(None)` if not cached.
    async fn get(&self, key: &BarKey) -> Result<Option<DataFrame>>;

    /// Stores a frame under `key`, replacing any previous entry.
    async fn put(&self, key: BarKey, data: &DataFrame) -> Result<()>;

    /// Removes entries older than `ttl`, returning how many were removed.
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize>;

    /// Removes every entry, returning how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Number of cached entries.
    async fn len(&self) -> usize;

    /// Returns true when nothing is cached.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
