//! Core data types for A-share market data.
//!
//! This module defines the fundamental data structures:
//!
//! - [`StockCode`] - Instrument code, always held in qualified form when possible
//! - [`Exchange`] - Listing exchange derived from the code suffix
//! - [`MarketDataRequest`] - Parameters of a market data query
//! - [`MarketDataResult`] - Per-code tables returned by providers
//! - [`FetchOutcome`] - Tagged per-code outcome of a market data query
//! - [`InstrumentDetail`] - Reference record for a single instrument
//! - [`DownloadOptions`] - Options for history downloads

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::normalize;
use crate::period::{DividendType, Period};

/// Listing exchange of an instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exchange {
    /// Shanghai Stock Exchange (`.SH`).
    #[serde(rename = "SH")]
    Shanghai,
    /// Shenzhen Stock Exchange (`.SZ`).
    #[serde(rename = "SZ")]
    Shenzhen,
    /// Beijing Stock Exchange (`.BJ`).
    #[serde(rename = "BJ")]
    Beijing,
}

impl Exchange {
    /// Market suffix used in qualified codes.
    #[must_use]
    pub const fn suffix(&self) -> &'static str {
        match self {
            Self::Shanghai => "SH",
            Self::Shenzhen => "SZ",
            Self::Beijing => "BJ",
        }
    }

    /// Parses a market suffix, case-insensitively.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_uppercase().as_str() {
            "SH" => Some(Self::Shanghai),
            "SZ" => Some(Self::Shenzhen),
            "BJ" => Some(Self::Beijing),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// An instrument code.
///
/// Codes are normalized on creation: a bare code gets its market suffix from
/// its leading digit (`600036` becomes `600036.SH`), a code that already has
/// a suffix is kept as given, and anything unrecognised passes through bare.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StockCode(String);

impl StockCode {
    /// Creates a code from either a bare or a qualified string.
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(normalize::normalize_code(s.as_ref()))
    }

    /// Creates a qualified code for a bare code whose exchange is already known.
    ///
    /// Use this when the listing exchange comes from the backend rather than
    /// from the code prefix, e.g. Shanghai index `000001`.
    #[must_use]
    pub fn with_exchange(bare: &str, exchange: Exchange) -> Self {
        Self(format!(
            "{}.{}",
            normalize::strip_suffix(bare.trim()),
            exchange.suffix()
        ))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the code without its market suffix.
    #[must_use]
    pub fn bare(&self) -> &str {
        normalize::strip_suffix(&self.0)
    }

    /// Returns the market suffix, if any.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, suffix)| suffix)
    }

    /// Returns the listing exchange when the suffix is a known one.
    #[must_use]
    pub fn exchange(&self) -> Option<Exchange> {
        self.suffix().and_then(Exchange::from_suffix)
    }

    /// Returns true if the code carries a market suffix.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        self.suffix().is_some()
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StockCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for StockCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StockCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<StockCode> for String {
    fn from(code: StockCode) -> Self {
        code.0
    }
}

/// Parameters of a market data query.
///
/// Fields are kept in the caller's order with duplicates removed; `time` is
/// implied and always returned first, so it is dropped from the field list.
/// Codes are normalized and de-duplicated in the same way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketDataRequest {
    /// Requested value columns, e.g. `open`, `close`, `volume`.
    pub fields: Vec<String>,
    /// Instruments to fetch.
    pub codes: Vec<StockCode>,
    /// Bar granularity.
    pub period: Period,
    /// First calendar date to include.
    pub start: Option<NaiveDate>,
    /// Last calendar date to include.
    pub end: Option<NaiveDate>,
    /// Maximum number of bars, `None` for unlimited.
    pub count: Option<usize>,
    /// Price adjustment.
    pub dividend_type: DividendType,
}

impl MarketDataRequest {
    /// Creates a daily, unadjusted, unbounded request.
    #[must_use]
    pub fn new<F, C>(fields: F, codes: C) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<StockCode>,
    {
        let mut seen = HashSet::new();
        let fields = fields
            .into_iter()
            .map(Into::<String>::into)
            .filter(|f| f != normalize::TIME_COLUMN)
            .filter(|f| seen.insert(f.clone()))
            .collect();

        let mut seen = HashSet::new();
        let codes = codes
            .into_iter()
            .map(Into::<StockCode>::into)
            .filter(|c| seen.insert(c.clone()))
            .collect();

        Self {
            fields,
            codes,
            period: Period::Daily,
            start: None,
            end: None,
            count: None,
            dividend_type: DividendType::None,
        }
    }

    /// Sets the bar granularity.
    #[must_use]
    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    /// Sets the inclusive date range.
    #[must_use]
    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Sets the inclusive date range from `YYYYMMDD` strings.
    ///
    /// Empty strings leave that side unbounded. Strings carrying a time of
    /// day (`YYYYMMDDhhmmss`) are truncated to their date.
    pub fn with_range_str(self, start: &str, end: &str) -> Result<Self> {
        let start = parse_date_bound(start)?;
        let end = parse_date_bound(end)?;
        Ok(self.with_range(start, end))
    }

    /// Sets the bar limit, `None` for unlimited.
    #[must_use]
    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }

    /// Sets the price adjustment.
    #[must_use]
    pub fn with_dividend(mut self, dividend_type: DividendType) -> Self {
        self.dividend_type = dividend_type;
        self
    }
}

/// Parses a `YYYYMMDD` (optionally followed by `hhmmss`) date bound.
///
/// Returns `Ok(None)` for an empty string.
pub fn parse_date_bound(s: &str) -> Result<Option<NaiveDate>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let date = s
        .get(..8)
        .ok_or_else(|| DataError::InvalidParameter(format!("invalid date: {s}")))?;
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .map(Some)
        .map_err(|e| DataError::InvalidParameter(format!("invalid date {s}: {e}")))
}

/// Per-code market data tables. Codes without data are absent.
pub type MarketDataResult = BTreeMap<StockCode, DataFrame>;

/// Outcome of fetching one code.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Normalized, non-empty table.
    Data(DataFrame),
    /// The backend answered but had no rows for this code and range.
    NoData,
    /// The fetch failed; the error has already been logged.
    Failed(DataError),
}

impl FetchOutcome {
    /// Wraps a normalized table, mapping an empty one to [`FetchOutcome::NoData`].
    #[must_use]
    pub fn from_frame(df: DataFrame) -> Self {
        if df.height() == 0 {
            Self::NoData
        } else {
            Self::Data(df)
        }
    }

    /// Returns the table if this outcome carries one.
    #[must_use]
    pub fn into_data(self) -> Option<DataFrame> {
        match self {
            Self::Data(df) => Some(df),
            Self::NoData | Self::Failed(_) => None,
        }
    }

    /// Returns true if the fetch failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-code outcomes of a market data query, one entry per requested code.
pub type MarketDataOutcomes = BTreeMap<StockCode, FetchOutcome>;

/// Collapses outcomes into the fail-soft result shape: only codes with data survive.
#[must_use]
pub fn into_result(outcomes: MarketDataOutcomes) -> MarketDataResult {
    outcomes
        .into_iter()
        .filter_map(|(code, outcome)| outcome.into_data().map(|df| (code, df)))
        .collect()
}

/// Reference record for an instrument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDetail {
    /// Qualified instrument code.
    pub instrument_id: StockCode,
    /// Display name; empty when the backend does not carry names.
    pub name: String,
    /// Listing exchange.
    pub exchange: Option<Exchange>,
    /// Any further backend fields, passed through untouched.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InstrumentDetail {
    /// Creates a record with an empty name and no extra fields.
    #[must_use]
    pub fn new(instrument_id: StockCode, exchange: Option<Exchange>) -> Self {
        Self {
            instrument_id,
            name: String::new(),
            exchange,
            extra: serde_json::Map::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the extra backend fields.
    #[must_use]
    pub fn with_extra(mut self, extra: serde_json::Map<String, serde_json::Value>) -> Self {
        self.extra = extra;
        self
    }
}

/// Options for [`download_history_data`](crate::provider::MarketDataProvider::download_history_data).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Only fetch bars newer than what the backend already holds locally.
    pub incremental: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self { incremental: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_stock_code_normalizes() {
        assert_eq!(StockCode::new("600036").as_str(), "600036.SH");
        assert_eq!(StockCode::from("000001").as_str(), "000001.SZ");
        assert_eq!(StockCode::from("300750".to_string()).as_str(), "300750.SZ");
        assert_eq!(StockCode::new("830799").as_str(), "830799");
    }

    #[test]
    fn test_stock_code_accessors() {
        let code = StockCode::new("000001.SH");
        assert_eq!(code.bare(), "000001");
        assert_eq!(code.suffix(), Some("SH"));
        assert_eq!(code.exchange(), Some(Exchange::Shanghai));
        assert!(code.is_qualified());

        let bare = StockCode::new("830799");
        assert_eq!(bare.suffix(), None);
        assert_eq!(bare.exchange(), None);
    }

    #[test]
    fn test_stock_code_with_exchange() {
        let code = StockCode::with_exchange("000300", Exchange::Shanghai);
        assert_eq!(code.as_str(), "000300.SH");
        let code = StockCode::with_exchange("159915.SZ", Exchange::Shenzhen);
        assert_eq!(code.as_str(), "159915.SZ");
    }

    #[test]
    fn test_stock_code_serde() {
        let code: StockCode = serde_json::from_str("\"600036\"").unwrap();
        assert_eq!(code.as_str(), "600036.SH");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"600036.SH\"");
    }

    #[test]
    fn test_request_dedup() {
        let request = MarketDataRequest::new(
            ["open", "time", "close", "open"],
            ["600036", "600036.SH", "000001.SZ"],
        );
        assert_eq!(request.fields, vec!["open", "close"]);
        assert_eq!(
            request.codes,
            vec![StockCode::new("600036.SH"), StockCode::new("000001.SZ")]
        );
        assert_eq!(request.period, Period::Daily);
        assert_eq!(request.count, None);
    }

    #[test]
    fn test_request_range_str() {
        let request = MarketDataRequest::new(["close"], ["600036"])
            .with_range_str("20240101", "20240110093000")
            .unwrap();
        assert_eq!(request.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(request.end, NaiveDate::from_ymd_opt(2024, 1, 10));

        let open = MarketDataRequest::new(["close"], ["600036"])
            .with_range_str("", "")
            .unwrap();
        assert_eq!(open.start, None);

        assert!(
            MarketDataRequest::new(["close"], ["600036"])
                .with_range_str("2024-01", "")
                .is_err()
        );
    }

    #[test]
    fn test_into_result_drops_missing() {
        let df = DataFrame::new(vec![Column::new("close".into(), vec![1.0, 2.0])]).unwrap();
        let mut outcomes = MarketDataOutcomes::new();
        outcomes.insert(StockCode::new("600036"), FetchOutcome::from_frame(df));
        outcomes.insert(StockCode::new("000001"), FetchOutcome::NoData);
        outcomes.insert(
            StockCode::new("300750"),
            FetchOutcome::Failed(DataError::Backend("timeout".into())),
        );

        let result = into_result(outcomes);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&StockCode::new("600036.SH")));
    }

    #[test]
    fn test_outcome_empty_frame_is_no_data() {
        let df = DataFrame::new(vec![Column::new("close".into(), Vec::<f64>::new())]).unwrap();
        assert!(matches!(FetchOutcome::from_frame(df), FetchOutcome::NoData));
    }

    #[test]
    fn test_download_options_default() {
        assert!(DownloadOptions::default().incremental);
    }
}
