#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Uniform A-share market data access.
//!
//! This crate re-exports the core types, the cache implementations and the
//! enabled backends, and provides the [`ProviderFactory`] that owns the
//! active provider.
//!
//! # Features
//!
//! - `terminal` - Trading terminal backend
//! - `quotes` - Quotation protocol backend
//! - `full` - Every backend
//!
//! # Example
//!
//! ```rust,ignore
//! use marketdata::{MarketDataProvider, MarketDataRequest, ProviderConfig, ProviderFactory};
//!
//! #[tokio::main]
//! async fn main() -> marketdata::Result<()> {
//!     let mut factory = ProviderFactory::new().with_terminal(my_terminal_connector());
//!     let provider = factory.get_provider(&ProviderConfig::terminal()).await?;
//!
//!     let request = MarketDataRequest::new(["open", "close"], ["600036", "000001.SZ"])
//!         .with_range_str("20240101", "20240110")?;
//!     for (code, df) in provider.get_market_data(&request).await {
//!         println!("{code}: {df}");
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use marketdata_core::*;

// Cache implementations
pub use marketdata_cache::{InMemoryCache, NoopCache};

// Providers
#[cfg(feature = "quotes")]
pub use marketdata_quotes::{OfflineReader, QuoteClient, QuotesAdapter, QuotesConnector};
#[cfg(feature = "terminal")]
pub use marketdata_terminal::{TerminalAdapter, TerminalApi, TerminalConnector};

mod factory;
pub use factory::ProviderFactory;
