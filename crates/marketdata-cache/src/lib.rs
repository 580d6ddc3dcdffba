#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Raw bar cache implementations for market data providers.
//!
//! This crate provides implementations of the [`BarCache`] trait from `marketdata-core`:
//!
//! - [`InMemoryCache`] - In-memory cache shared across provider switches
//! - [`NoopCache`] - No-op cache that doesn't store anything

/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

// Re-export the trait for convenience
pub use marketdata_core::BarCache;

// Re-export implementations
pub use memory::InMemoryCache;
pub use noop::NoopCache;
