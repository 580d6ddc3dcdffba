//! Bar granularity, dividend adjustment and security kind definitions.
//!
//! This module defines [`Period`] for the granularity of a series,
//! [`DividendType`] for price adjustment and [`SecurityKind`] for the
//! universes a provider can enumerate. Each parses from the short tokens used
//! in configuration files and by the terminal backend (`"1d"`, `"front"`,
//! `"etf"`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// Granularity of a market data series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    /// Individual ticks.
    Tick,
    /// One-minute bars.
    Minute1,
    /// Five-minute bars.
    Minute5,
    /// Fifteen-minute bars.
    Minute15,
    /// Thirty-minute bars.
    Minute30,
    /// Hourly bars (`60m` and `1h` are the same period).
    Hour1,
    /// Daily bars.
    #[default]
    Daily,
    /// Weekly bars.
    Weekly,
    /// Monthly bars.
    Monthly,
}

impl Period {
    /// All defined periods, finest first.
    pub const ALL: [Self; 9] = [
        Self::Tick,
        Self::Minute1,
        Self::Minute5,
        Self::Minute15,
        Self::Minute30,
        Self::Hour1,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
    ];

    /// Canonical short token for this period.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Hour1 => "1h",
            Self::Daily => "1d",
            Self::Weekly => "1w",
            Self::Monthly => "1mon",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tick" => Ok(Self::Tick),
            "1m" => Ok(Self::Minute1),
            "5m" => Ok(Self::Minute5),
            "15m" => Ok(Self::Minute15),
            "30m" => Ok(Self::Minute30),
            "60m" | "1h" => Ok(Self::Hour1),
            "1d" => Ok(Self::Daily),
            "1w" => Ok(Self::Weekly),
            "1mon" => Ok(Self::Monthly),
            other => Err(DataError::InvalidParameter(format!("unknown period: {other}"))),
        }
    }
}

impl TryFrom<String> for Period {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.as_str().to_string()
    }
}

/// Dividend adjustment applied to historical prices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DividendType {
    /// Raw prices. Bulk downloads always use this.
    #[default]
    None,
    /// Forward-adjusted prices.
    Front,
    /// Backward-adjusted prices.
    Back,
}

impl DividendType {
    /// Short token for this adjustment type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Front => "front",
            Self::Back => "back",
        }
    }
}

impl fmt::Display for DividendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DividendType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            other => Err(DataError::InvalidParameter(format!(
                "unknown dividend type: {other}"
            ))),
        }
    }
}

/// Universe selector for stock list queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityKind {
    /// Listed equities.
    #[default]
    Stock,
    /// Exchange indices.
    Index,
    /// Exchange traded funds.
    Etf,
}

impl fmt::Display for SecurityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stock => "stock",
            Self::Index => "index",
            Self::Etf => "etf",
        })
    }
}

impl FromStr for SecurityKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(Self::Stock),
            "index" => Ok(Self::Index),
            "etf" => Ok(Self::Etf),
            other => Err(DataError::InvalidParameter(format!(
                "unknown security kind: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_tokens_roundtrip() {
        for period in Period::ALL {
            assert_eq!(period.as_str().parse::<Period>().unwrap(), period);
        }
    }

    #[test]
    fn test_period_aliases() {
        assert_eq!("60m".parse::<Period>().unwrap(), Period::Hour1);
        assert_eq!("1H".parse::<Period>().unwrap(), Period::Hour1);
        assert!("2d".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_default() {
        assert_eq!(Period::default(), Period::Daily);
    }

    #[test]
    fn test_dividend_parse() {
        assert_eq!("none".parse::<DividendType>().unwrap(), DividendType::None);
        assert_eq!("front".parse::<DividendType>().unwrap(), DividendType::Front);
        assert_eq!("back".parse::<DividendType>().unwrap(), DividendType::Back);
        assert!("qfq".parse::<DividendType>().is_err());
    }

    #[test]
    fn test_security_kind_parse() {
        assert_eq!("ETF".parse::<SecurityKind>().unwrap(), SecurityKind::Etf);
        assert!("bond".parse::<SecurityKind>().is_err());
    }
}
