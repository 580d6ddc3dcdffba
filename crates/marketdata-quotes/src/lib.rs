#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Quotation protocol data provider.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use marketdata_cache::InMemoryCache;
//! use marketdata_core::{MarketDataProvider, MarketDataRequest, RetryPolicy};
//! use marketdata_quotes::{QuoteClient, QuotesAdapter};
//!
//! # async fn example(client: Arc<dyn QuoteClient>) -> marketdata_core::Result<()> {
//! let provider = QuotesAdapter::online(client, Arc::new(InMemoryCache::new()), RetryPolicy::default());
//! let request = MarketDataRequest::new(["close"], ["600036", "000300.SH"])
//!     .with_range_str("20240101", "20240331")?;
//!
//! let result = provider.get_market_data(&request).await;
//! println!("{} codes with data", result.len());
//! # Ok(())
//! # }
//! ```

/// The provider implementation.
pub mod adapter;
/// Client traits a quotation binding implements.
pub mod client;

pub use adapter::{QuotesAdapter, adjust_token, frequency_code};
pub use client::{MARKET_SH, MARKET_SZ, OfflineReader, QuoteClient, QuotesConnector};
