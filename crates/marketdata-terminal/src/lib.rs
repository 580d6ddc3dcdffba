#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Trading terminal data provider.
//!
//! [`TerminalAdapter`] implements [`MarketDataProvider`] on top of a
//! [`TerminalApi`] handle. The terminal does the heavy lifting: it stores
//! history locally, filters date ranges itself and owns the sector catalog.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use marketdata_core::{MarketDataProvider, MarketDataRequest, Period};
//! use marketdata_terminal::{TerminalAdapter, TerminalApi};
//!
//! # async fn example(api: Arc<dyn TerminalApi>) -> marketdata_core::Result<()> {
//! let provider = TerminalAdapter::new(api);
//! let request = MarketDataRequest::new(["open", "close"], ["600036"])
//!     .with_period(Period::Daily)
//!     .with_range_str("20240101", "20240110")?;
//!
//! for (code, df) in provider.get_market_data(&request).await {
//!     println!("{code}: {} rows", df.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use marketdata_core::{
    DataError, DividendType, DownloadOptions, Exchange, FetchOutcome, InstrumentDetail,
    MarketDataOutcomes, MarketDataProvider, MarketDataRequest, Period, ProviderKind, Result,
    SecurityKind, StockCode, normalize::{TIME_COLUMN, normalize_columns},
};
use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

/// Raw instrument record as the terminal reports it.
pub type RawInstrument = Map<String, Value>;

/// Calls exposed by the terminal SDK.
///
/// Codes, periods and dates are passed in the terminal's own string formats:
/// qualified codes (`600036.SH`), period tokens from [`period_token`],
/// dividend tokens from [`dividend_token`] and `YYYYMMDD` dates where an
/// empty string means unbounded.
///
/// Market data frames carry a `time` column of integer epoch milliseconds;
/// it is shown in exchange local time (UTC+08:00) after normalization.
#[async_trait]
pub trait TerminalApi: Send + Sync + Debug {
    /// Downloads history into the terminal's local store.
    async fn download_history_data2(
        &self,
        codes: &[String],
        period: &str,
        start: &str,
        end: &str,
        incremental: bool,
    ) -> Result<()>;

    /// Reads bars for many codes at once, keyed by code.
    ///
    /// `count` of `-1` means unlimited.
    #[allow(clippy::too_many_arguments)]
    async fn get_market_data_ex(
        &self,
        fields: &[String],
        codes: &[String],
        period: &str,
        start: &str,
        end: &str,
        count: i64,
        dividend_type: &str,
    ) -> Result<HashMap<String, DataFrame>>;

    /// Lists the members of a sector.
    async fn get_stock_list_in_sector(&self, sector_name: &str) -> Result<Vec<String>>;

    /// Lists every sector the terminal knows.
    async fn get_sector_list(&self) -> Result<Vec<String>>;

    /// Refreshes sector membership data.
    async fn download_sector_data(&self) -> Result<()>;

    /// Looks up the raw record of one instrument.
    async fn get_instrument_detail(&self, code: &str) -> Result<Option<RawInstrument>>;
}

/// Produces a live [`TerminalApi`] handle.
///
/// Implementations report [`DataError::DependencyMissing`] when the SDK is
/// unavailable and [`DataError::BackendUnreachable`] when the terminal
/// process cannot be reached.
#[async_trait]
pub trait TerminalConnector: Send + Sync + Debug {
    /// Opens a session with the terminal.
    async fn connect(&self) -> Result<Arc<dyn TerminalApi>>;
}

/// Terminal period token for a [`Period`].
#[must_use]
pub const fn period_token(period: Period) -> &'static str {
    match period {
        Period::Tick => "tick",
        Period::Minute1 => "1m",
        Period::Minute5 => "5m",
        Period::Minute15 => "15m",
        Period::Minute30 => "30m",
        Period::Hour1 => "1h",
        Period::Daily => "1d",
        Period::Weekly => "1w",
        Period::Monthly => "1mon",
    }
}

/// Terminal dividend token for a [`DividendType`].
#[must_use]
pub const fn dividend_token(dividend_type: DividendType) -> &'static str {
    match dividend_type {
        DividendType::None => "none",
        DividendType::Front => "front",
        DividendType::Back => "back",
    }
}

/// Terminal sector that lists every security of a kind.
#[must_use]
pub const fn sector_for_kind(kind: SecurityKind) -> &'static str {
    match kind {
        SecurityKind::Stock => "沪深A股",
        SecurityKind::Index => "指数",
        SecurityKind::Etf => "ETF",
    }
}

fn date_token(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y%m%d").to_string()).unwrap_or_default()
}

fn code_strings(codes: &[StockCode]) -> Vec<String> {
    codes.iter().map(ToString::to_string).collect()
}

fn string_field(raw: &RawInstrument, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Maps a raw terminal record into an [`InstrumentDetail`].
///
/// `InstrumentID`, `ExchangeID` and `InstrumentName` become typed fields;
/// everything else is kept in `extra`. Returns `None` for an empty record.
#[must_use]
pub fn instrument_from_raw(requested: &StockCode, mut raw: RawInstrument) -> Option<InstrumentDetail> {
    if raw.is_empty() {
        return None;
    }

    let exchange = string_field(&raw, "ExchangeID")
        .and_then(|id| Exchange::from_suffix(&id))
        .or_else(|| requested.exchange());

    let instrument_id = match (string_field(&raw, "InstrumentID"), exchange) {
        (Some(id), _) if id.contains('.') => StockCode::new(id),
        (Some(id), Some(exchange)) => StockCode::with_exchange(&id, exchange),
        (Some(id), None) => StockCode::new(id),
        (None, _) => requested.clone(),
    };
    let name = string_field(&raw, "InstrumentName").unwrap_or_default();

    for key in ["InstrumentID", "ExchangeID", "InstrumentName"] {
        raw.remove(key);
    }

    Some(
        InstrumentDetail::new(instrument_id, exchange)
            .with_name(name)
            .with_extra(raw),
    )
}

/// Market data provider backed by the trading terminal.
#[derive(Debug, Clone)]
pub struct TerminalAdapter {
    api: Arc<dyn TerminalApi>,
}

impl TerminalAdapter {
    /// Wraps an already connected terminal handle.
    #[must_use]
    pub fn new(api: Arc<dyn TerminalApi>) -> Self {
        Self { api }
    }

    /// Connects through `connector` and wraps the resulting handle.
    ///
    /// Connector errors that are not construction errors are reported as
    /// [`DataError::BackendUnreachable`].
    pub async fn connect(connector: &dyn TerminalConnector) -> Result<Self> {
        let api = connector.connect().await.map_err(|e| {
            if e.is_construction() {
                e
            } else {
                DataError::BackendUnreachable {
                    backend: ProviderKind::Terminal.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        info!("Terminal provider connected");
        Ok(Self::new(api))
    }
}

#[async_trait]
impl MarketDataProvider for TerminalAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Terminal
    }

    fn name(&self) -> &str {
        "terminal"
    }

    async fn download_history_data(
        &self,
        codes: &[StockCode],
        period: Period,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        options: &DownloadOptions,
    ) -> bool {
        let result = self
            .api
            .download_history_data2(
                &code_strings(codes),
                period_token(period),
                &date_token(start),
                &date_token(end),
                options.incremental,
            )
            .await;

        match result {
            Ok(()) => {
                info!(codes = codes.len(), %period, "History download finished");
                true
            }
            Err(e) => {
                error!(error = %e, codes = codes.len(), %period, "History download failed");
                false
            }
        }
    }

    async fn fetch_market_data(&self, request: &MarketDataRequest) -> MarketDataOutcomes {
        if request.codes.is_empty() {
            return MarketDataOutcomes::new();
        }

        let fields: Vec<String> = std::iter::once(TIME_COLUMN.to_string())
            .chain(request.fields.iter().cloned())
            .collect();
        let count = request
            .count
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

        debug!(
            codes = request.codes.len(),
            period = %request.period,
            count,
            "Requesting market data from terminal"
        );

        let frames = self
            .api
            .get_market_data_ex(
                &fields,
                &code_strings(&request.codes),
                period_token(request.period),
                &date_token(request.start),
                &date_token(request.end),
                count,
                dividend_token(request.dividend_type),
            )
            .await;

        let mut frames = match frames {
            Ok(frames) => frames,
            Err(e) => {
                error!(error = %e, codes = request.codes.len(), "Terminal market data call failed");
                return request
                    .codes
                    .iter()
                    .map(|code| (code.clone(), FetchOutcome::Failed(DataError::Backend(e.to_string()))))
                    .collect();
            }
        };

        request
            .codes
            .iter()
            .map(|code| {
                let outcome = match frames.remove(code.as_str()) {
                    Some(df) => match normalize_columns(df, TIME_COLUMN, &request.fields) {
                        Ok(df) => FetchOutcome::from_frame(df),
                        Err(e) => {
                            warn!(%code, error = %e, "Could not normalize terminal table");
                            FetchOutcome::Failed(e)
                        }
                    },
                    None => FetchOutcome::NoData,
                };
                (code.clone(), outcome)
            })
            .collect()
    }

    async fn get_stock_list_in_sector(&self, sector_name: &str) -> Vec<StockCode> {
        match self.api.get_stock_list_in_sector(sector_name).await {
            Ok(codes) => codes.into_iter().map(StockCode::new).collect(),
            Err(e) => {
                error!(sector = sector_name, error = %e, "Failed to list sector members");
                Vec::new()
            }
        }
    }

    async fn get_stock_list(&self, market: SecurityKind) -> Vec<StockCode> {
        self.get_stock_list_in_sector(sector_for_kind(market)).await
    }

    async fn get_sector_list(&self) -> Vec<String> {
        match self.api.get_sector_list().await {
            Ok(sectors) => sectors,
            Err(e) => {
                error!(error = %e, "Failed to list sectors");
                Vec::new()
            }
        }
    }

    async fn download_sector_data(&self) -> bool {
        match self.api.download_sector_data().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Sector download failed");
                false
            }
        }
    }

    async fn get_instrument_detail(&self, code: &StockCode) -> Option<InstrumentDetail> {
        match self.api.get_instrument_detail(code.as_str()).await {
            Ok(Some(raw)) => instrument_from_raw(code, raw),
            Ok(None) => None,
            Err(e) => {
                error!(%code, error = %e, "Instrument lookup failed");
                None
            }
        }
    }
}
