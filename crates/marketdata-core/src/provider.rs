//! The provider interface every backend implements.
//!
//! [`MarketDataProvider`] is the only thing calling code depends on. Data
//! retrieval methods never return errors: failures are logged and degrade to
//! "no data" (an absent map entry, an empty list, `None` or `false`).
//! Construction errors are reported by whoever builds the provider.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;
use tracing::debug;

use crate::{
    config::ProviderKind,
    period::{Period, SecurityKind},
    types::{
        DownloadOptions, FetchOutcome, InstrumentDetail, MarketDataOutcomes, MarketDataRequest,
        MarketDataResult, StockCode, into_result,
    },
};

/// Sector names offered by backends that have no sector catalog.
pub const COMMON_SECTORS: &[&str] = &[
    "沪深A股",
    "沪深300",
    "上证50",
    "中证500",
    "创业板",
    "科创板",
    "沪深京A股",
    "北交所",
    "沪深转债",
];

/// Uniform market data contract.
#[async_trait]
pub trait MarketDataProvider: Send + Sync + Debug {
    /// Backend family of this provider.
    fn kind(&self) -> ProviderKind;

    /// Human readable name, used in logs.
    fn name(&self) -> &str;

    /// Pulls history into the backend's local store.
    ///
    /// Backends that fetch on demand treat this as a successful no-op.
    /// Returns `false` on failure; the cause is logged.
    async fn download_history_data(
        &self,
        codes: &[StockCode],
        period: Period,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        options: &DownloadOptions,
    ) -> bool;

    /// Fetches market data and reports a tagged outcome for every requested code.
    ///
    /// Unlike [`get_market_data`](Self::get_market_data) this keeps "no
    /// rows" apart from "fetch failed".
    async fn fetch_market_data(&self, request: &MarketDataRequest) -> MarketDataOutcomes;

    /// Fetches market data, keeping only codes that produced rows.
    ///
    /// Each table starts with a `time` column followed by the requested
    /// fields the backend provided, in chronological order.
    async fn get_market_data(&self, request: &MarketDataRequest) -> MarketDataResult {
        let outcomes = self.fetch_market_data(request).await;
        let failed = outcomes.values().filter(|o| o.is_failed()).count();
        let empty = outcomes
            .values()
            .filter(|o| matches!(o, FetchOutcome::NoData))
            .count();
        let result = into_result(outcomes);
        debug!(
            provider = self.name(),
            requested = request.codes.len(),
            returned = result.len(),
            empty,
            failed,
            "Market data fetched"
        );
        result
    }

    /// Lists the members of a sector. Empty when unsupported.
    async fn get_stock_list_in_sector(&self, sector_name: &str) -> Vec<StockCode>;

    /// Lists every stock, index or ETF. Empty when unsupported.
    async fn get_stock_list(&self, market: SecurityKind) -> Vec<StockCode>;

    /// Lists sector names, or [`COMMON_SECTORS`] without a native catalog.
    async fn get_sector_list(&self) -> Vec<String>;

    /// Refreshes sector membership data. No-op success where not needed.
    async fn download_sector_data(&self) -> bool;

    /// Looks up reference data for one instrument. `None` when unknown.
    async fn get_instrument_detail(&self, code: &StockCode) -> Option<InstrumentDetail>;

    /// Qualifies a bare code. Identical for every backend.
    fn normalize_stock_code(&self, code: &str) -> StockCode {
        StockCode::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use polars::prelude::*;

    /// Provider answering from a fixed set of outcomes.
    #[derive(Debug)]
    struct FixedProvider;

    #[async_trait]
    impl MarketDataProvider for FixedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Terminal
        }

        fn name(&self) -> &str {
            "fixed"
        }

        async fn download_history_data(
            &self,
            _codes: &[StockCode],
            _period: Period,
            _start: Option<NaiveDate>,
            _end: Option<NaiveDate>,
            _options: &DownloadOptions,
        ) -> bool {
            true
        }

        async fn fetch_market_data(&self, request: &MarketDataRequest) -> MarketDataOutcomes {
            request
                .codes
                .iter()
                .map(|code| {
                    let outcome = match code.as_str() {
                        "600036.SH" => FetchOutcome::from_frame(
                            DataFrame::new(vec![Column::new("close".into(), vec![1.0])]).unwrap(),
                        ),
                        "300750.SZ" => FetchOutcome::Failed(DataError::Backend("down".into())),
                        _ => FetchOutcome::NoData,
                    };
                    (code.clone(), outcome)
                })
                .collect()
        }

        async fn get_stock_list_in_sector(&self, _sector_name: &str) -> Vec<StockCode> {
            Vec::new()
        }

        async fn get_stock_list(&self, _market: SecurityKind) -> Vec<StockCode> {
            Vec::new()
        }

        async fn get_sector_list(&self) -> Vec<String> {
            COMMON_SECTORS.iter().map(|s| s.to_string()).collect()
        }

        async fn download_sector_data(&self) -> bool {
            true
        }

        async fn get_instrument_detail(&self, _code: &StockCode) -> Option<InstrumentDetail> {
            None
        }
    }

    #[tokio::test]
    async fn test_get_market_data_keeps_only_data() {
        let request = MarketDataRequest::new(["close"], ["600036", "000001", "300750"]);
        let result = FixedProvider.get_market_data(&request).await;

        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&StockCode::new("600036.SH")));
        assert!(!result.contains_key(&StockCode::new("000001.SZ")));
    }

    #[tokio::test]
    async fn test_fetch_market_data_distinguishes_failures() {
        let request = MarketDataRequest::new(["close"], ["000001", "300750"]);
        let outcomes = FixedProvider.fetch_market_data(&request).await;

        assert!(matches!(
            outcomes[&StockCode::new("000001.SZ")],
            FetchOutcome::NoData
        ));
        assert!(outcomes[&StockCode::new("300750.SZ")].is_failed());
    }

    #[test]
    fn test_normalize_stock_code_default() {
        assert_eq!(FixedProvider.normalize_stock_code("600036").as_str(), "600036.SH");
        assert_eq!(
            FixedProvider.normalize_stock_code("000001.SH").as_str(),
            "000001.SH"
        );
    }
}
