//! Quotation client seams.
//!
//! The adapter never talks to the wire itself. It goes through these traits,
//! which a binding implements over the real protocol client.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use marketdata_core::Result;
use polars::prelude::DataFrame;

/// Market id of the Shenzhen exchange.
pub const MARKET_SZ: u8 = 0;
/// Market id of the Shanghai exchange.
pub const MARKET_SH: u8 = 1;

/// Calls exposed by an online quotation client.
///
/// Symbols are bare codes. Bar frames carry a `date` column plus OHLCV
/// columns in ascending time order; list frames carry a `code` column.
///
/// `date` is either integer epoch milliseconds (an instant) or a naive
/// `Datetime` in exchange local time (UTC+08:00). The same holds for
/// [`OfflineReader`] frames.
#[async_trait]
pub trait QuoteClient: Send + Sync + Debug {
    /// Latest `offset` bars of a security.
    async fn bars(
        &self,
        symbol: &str,
        frequency: u8,
        offset: usize,
        adjust: &str,
    ) -> Result<DataFrame>;

    /// Latest `offset` bars of an index.
    async fn index_bars(&self, symbol: &str, frequency: u8, offset: usize) -> Result<DataFrame>;

    /// Members of a named block (sector).
    async fn block_stocks(&self, block_name: &str) -> Result<DataFrame>;

    /// Every security listed on one market.
    async fn security_list(&self, market: u8) -> Result<DataFrame>;
}

/// Reader over a local quotation data directory.
#[async_trait]
pub trait OfflineReader: Send + Sync + Debug {
    /// Every stored daily bar of a security.
    async fn daily(&self, symbol: &str) -> Result<DataFrame>;

    /// Every stored minute bar of a security.
    async fn minute(&self, symbol: &str) -> Result<DataFrame>;
}

/// Produces quotation clients.
///
/// Implementations report `DependencyMissing` when the protocol binding is
/// unavailable; any other error is treated as the backend being unreachable.
#[async_trait]
pub trait QuotesConnector: Send + Sync + Debug {
    /// Connects to a quotation server.
    async fn online(&self) -> Result<Arc<dyn QuoteClient>>;

    /// Opens a local data directory.
    async fn offline(&self, data_dir: &Path) -> Result<Arc<dyn OfflineReader>>;
}
