#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for A-share market data providers.
//!
//! This crate provides the foundational abstractions shared by every backend:
//!
//! - [`MarketDataProvider`](provider::MarketDataProvider) - The uniform provider contract
//! - [`StockCode`](types::StockCode) - Self-normalizing instrument codes
//! - [`normalize`] - Code, column and date-range normalization rules
//! - [`ProviderConfig`](config::ProviderConfig) - Typed provider configuration
//! - [`BarCache`](cache::BarCache) - Raw bar caching abstraction

/// Cache trait and key type for raw backend bars.
pub mod cache;
/// Provider configuration.
pub mod config;
/// Error types for provider construction and data retrieval.
pub mod error;
/// Normalization rules shared by every backend.
pub mod normalize;
/// Bar period, dividend type and security kind definitions.
pub mod period;
/// The provider trait.
pub mod provider;
/// Core data types (StockCode, MarketDataRequest, InstrumentDetail, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{BarCache, BarKey};
pub use config::{ProviderConfig, ProviderKind, QuotesMode, RetryPolicy};
pub use error::{DataError, Result};
pub use period::{DividendType, Period, SecurityKind};
pub use provider::{COMMON_SECTORS, MarketDataProvider};
pub use types::{
    DownloadOptions, Exchange, FetchOutcome, InstrumentDetail, MarketDataOutcomes,
    MarketDataRequest, MarketDataResult, StockCode,
};
