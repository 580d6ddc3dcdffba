//! Provider configuration.
//!
//! [`ProviderConfig`] names the backend to use and every option that affects
//! how it is built. It deserializes from JSON and accepts the key names used
//! by existing application config files (`data_provider_type`,
//! `mootdx_mode`, `mootdx_tdxdir`, `mootdx_use_cache`) as aliases.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Backend family behind a provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderKind {
    /// Always-connected local trading terminal.
    #[default]
    Terminal,
    /// Quotation library, online or offline.
    Quotes,
}

impl ProviderKind {
    /// Canonical name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Quotes => "quotes",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DataError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" | "xtquant" => Ok(Self::Terminal),
            "quotes" | "mootdx" => Ok(Self::Quotes),
            other => Err(DataError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = DataError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Operating mode of the quotation backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotesMode {
    /// Networked query client.
    #[default]
    Online,
    /// Local archived files, no network.
    Offline,
}

impl fmt::Display for QuotesMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Online => "online",
            Self::Offline => "offline",
        })
    }
}

/// Retry behaviour for online fetches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per fetch, at least one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// No retries and no delay.
    pub const NONE: Self = Self {
        max_attempts: 1,
        base_delay_ms: 0,
    };

    /// Delay to wait after the given zero-based failed attempt.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

/// Default freshness window of cached raw frames.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

/// Configuration used to build a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Backend to build.
    #[serde(alias = "data_provider_type")]
    pub kind: ProviderKind,
    /// Quotation backend mode. Ignored by the terminal backend.
    #[serde(alias = "mootdx_mode")]
    pub mode: QuotesMode,
    /// Local data directory, required in offline mode.
    #[serde(alias = "tdxdir", alias = "mootdx_tdxdir")]
    pub data_dir: Option<PathBuf>,
    /// Cache raw online bars between calls.
    #[serde(alias = "mootdx_use_cache")]
    pub use_cache: bool,
    /// Seconds a cached raw frame stays fresh; `None` keeps frames until cleared.
    pub cache_ttl_secs: Option<u64>,
    /// Retry policy for online fetches.
    pub retry: RetryPolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Terminal,
            mode: QuotesMode::Online,
            data_dir: None,
            use_cache: true,
            cache_ttl_secs: Some(DEFAULT_CACHE_TTL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl ProviderConfig {
    /// Configuration for the terminal backend.
    #[must_use]
    pub fn terminal() -> Self {
        Self::default()
    }

    /// Configuration for the quotation backend in online mode.
    #[must_use]
    pub fn quotes_online() -> Self {
        Self {
            kind: ProviderKind::Quotes,
            ..Self::default()
        }
    }

    /// Configuration for the quotation backend reading from `data_dir`.
    #[must_use]
    pub fn quotes_offline(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind: ProviderKind::Quotes,
            mode: QuotesMode::Offline,
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }

    /// Sets whether raw online bars are cached.
    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Sets how long cached raw frames stay fresh.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl_secs = ttl.map(|ttl| ttl.as_secs());
        self
    }

    /// Freshness window of cached raw frames.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parses a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Checks mode-specific requirements without touching the backend.
    ///
    /// Offline mode needs `data_dir` set to an existing directory.
    pub fn validate(&self) -> Result<()> {
        if self.kind != ProviderKind::Quotes || self.mode != QuotesMode::Offline {
            return Ok(());
        }

        let dir = self.data_dir.as_deref().ok_or_else(|| {
            DataError::MissingConfig("offline mode requires data_dir".to_string())
        })?;

        if !dir.is_dir() {
            return Err(DataError::InvalidConfig(format!(
                "offline data directory {} does not exist",
                dir.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!("terminal".parse::<ProviderKind>().unwrap(), ProviderKind::Terminal);
        assert_eq!("XtQuant".parse::<ProviderKind>().unwrap(), ProviderKind::Terminal);
        assert_eq!("mootdx".parse::<ProviderKind>().unwrap(), ProviderKind::Quotes);
        assert!(matches!(
            "tushare".parse::<ProviderKind>(),
            Err(DataError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.kind, ProviderKind::Terminal);
        assert_eq!(config.mode, QuotesMode::Online);
        assert!(config.use_cache);
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_cache_ttl_from_json() {
        let config = ProviderConfig::from_json_str(r#"{"cache_ttl_secs": 60}"#).unwrap();
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(60)));

        let config = ProviderConfig::from_json_str(r#"{"cache_ttl_secs": null}"#).unwrap();
        assert_eq!(config.cache_ttl(), None);

        let config = ProviderConfig::quotes_online().with_cache_ttl(Some(Duration::from_secs(90)));
        assert_eq!(config.cache_ttl_secs, Some(90));
    }

    #[test]
    fn test_from_json_with_legacy_keys() {
        let json = r#"{
            "data_provider_type": "mootdx",
            "mootdx_mode": "offline",
            "mootdx_tdxdir": "C:/new_tdx",
            "mootdx_use_cache": false
        }"#;
        let config = ProviderConfig::from_json_str(json).unwrap();
        assert_eq!(config.kind, ProviderKind::Quotes);
        assert_eq!(config.mode, QuotesMode::Offline);
        assert_eq!(config.data_dir, Some(PathBuf::from("C:/new_tdx")));
        assert!(!config.use_cache);
    }

    #[test]
    fn test_from_json_rejects_unknown_kind() {
        let err = ProviderConfig::from_json_str(r#"{"kind": "bloomberg"}"#).unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = ProviderConfig::from_json_file("/nonexistent/provider.json").unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
    }

    #[test]
    fn test_validate_offline() {
        let missing = ProviderConfig {
            data_dir: None,
            ..ProviderConfig::quotes_offline("unused")
        };
        assert!(matches!(missing.validate(), Err(DataError::MissingConfig(_))));

        let absent = ProviderConfig::quotes_offline("/nonexistent/vipdoc");
        assert!(matches!(absent.validate(), Err(DataError::InvalidConfig(_))));

        let present = ProviderConfig::quotes_offline(std::env::temp_dir());
        assert!(present.validate().is_ok());

        assert!(ProviderConfig::quotes_online().validate().is_ok());
        assert!(ProviderConfig::terminal().validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff(0), Duration::from_millis(1000));
        assert_eq!(retry.backoff(1), Duration::from_millis(2000));
        assert_eq!(retry.backoff(2), Duration::from_millis(4000));
        assert_eq!(RetryPolicy::NONE.backoff(5), Duration::ZERO);
    }
}
