//! Quotation provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use marketdata_cache::NoopCache;
use marketdata_core::{
    BarCache, BarKey, COMMON_SECTORS, DataError, DividendType, DownloadOptions, Exchange,
    FetchOutcome, InstrumentDetail, MarketDataOutcomes, MarketDataProvider, MarketDataRequest,
    Period, ProviderConfig, ProviderKind, QuotesMode, Result, RetryPolicy, SecurityKind, StockCode,
    normalize::{cap_count, classify_security, filter_by_date_range, is_index, normalize_columns},
};
use polars::prelude::DataFrame;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::{MARKET_SH, MARKET_SZ, OfflineReader, QuoteClient, QuotesConnector};

/// Native time column of quotation frames.
const NATIVE_TIME_COLUMN: &str = "date";

/// Code column of list frames.
const CODE_COLUMN: &str = "code";

/// Frequency used when a period has no quotation equivalent.
const DEFAULT_FREQUENCY: u8 = 9;

/// Quotation frequency code for a [`Period`].
///
/// Ticks have no bar equivalent and fall back to daily.
#[must_use]
pub const fn frequency_code(period: Period) -> u8 {
    match period {
        Period::Minute5 => 0,
        Period::Minute15 => 1,
        Period::Minute30 => 2,
        Period::Hour1 => 3,
        Period::Weekly => 5,
        Period::Monthly => 6,
        Period::Minute1 => 7,
        Period::Daily | Period::Tick => DEFAULT_FREQUENCY,
    }
}

/// Quotation adjustment token for a [`DividendType`].
#[must_use]
pub const fn adjust_token(dividend_type: DividendType) -> &'static str {
    match dividend_type {
        DividendType::None => "",
        DividendType::Front => "qfq",
        DividendType::Back => "hfq",
    }
}

#[derive(Debug)]
enum Source {
    Online {
        client: Arc<dyn QuoteClient>,
        cache: Arc<dyn BarCache>,
        retry: RetryPolicy,
        cache_ttl: Option<Duration>,
    },
    Offline {
        reader: Arc<dyn OfflineReader>,
    },
}

/// Market data provider backed by a quotation client.
///
/// Online mode serves bars, sectors and security lists from a quotation
/// server. Raw frames are cached per request window and entries older than
/// the cache TTL are evicted at the start of each request.
///
/// Offline mode serves daily and minute bars from a local directory and
/// nothing else. Stored files hold 1-minute bars only, so `Minute5` requests
/// are answered with 1-minute bars without resampling. Offline files are read
/// whole; `count` keeps the latest bars left after the date filter.
#[derive(Debug)]
pub struct QuotesAdapter {
    source: Source,
}

impl QuotesAdapter {
    /// Creates an online adapter.
    #[must_use]
    pub fn online(client: Arc<dyn QuoteClient>, cache: Arc<dyn BarCache>, retry: RetryPolicy) -> Self {
        Self {
            source: Source::Online {
                client,
                cache,
                retry,
                cache_ttl: None,
            },
        }
    }

    /// Evicts cached frames older than `ttl` before each request.
    ///
    /// `None` keeps frames until cleared. Offline adapters ignore this.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        if let Source::Online { cache_ttl, .. } = &mut self.source {
            *cache_ttl = ttl;
        }
        self
    }

    /// Creates an offline adapter.
    #[must_use]
    pub fn offline(reader: Arc<dyn OfflineReader>) -> Self {
        Self {
            source: Source::Offline { reader },
        }
    }

    /// Builds an adapter for `config` through `connector`.
    ///
    /// `cache` is used in online mode unless the config disables caching.
    pub async fn connect(
        connector: &dyn QuotesConnector,
        config: &ProviderConfig,
        cache: Arc<dyn BarCache>,
    ) -> Result<Self> {
        config.validate()?;

        let adapter = match (config.mode, config.data_dir.as_deref()) {
            (QuotesMode::Online, _) => {
                let client = connector.online().await.map_err(connect_error)?;
                let cache: Arc<dyn BarCache> = if config.use_cache {
                    cache
                } else {
                    Arc::new(NoopCache::new())
                };
                Self::online(client, cache, config.retry).with_cache_ttl(config.cache_ttl())
            }
            (QuotesMode::Offline, Some(dir)) => {
                let reader = connector.offline(dir).await.map_err(connect_error)?;
                Self::offline(reader)
            }
            (QuotesMode::Offline, None) => {
                return Err(DataError::MissingConfig(
                    "offline quotation mode requires data_dir".into(),
                ));
            }
        };

        info!(mode = %adapter.mode(), "Quotation provider initialized");
        Ok(adapter)
    }

    /// Mode this adapter runs in.
    #[must_use]
    pub const fn mode(&self) -> QuotesMode {
        match self.source {
            Source::Online { .. } => QuotesMode::Online,
            Source::Offline { .. } => QuotesMode::Offline,
        }
    }

    /// Drops every cached raw frame, returning how many were removed.
    pub async fn clear_cache(&self) -> usize {
        let Source::Online { cache, .. } = &self.source else {
            return 0;
        };
        match cache.clear().await {
            Ok(removed) => {
                info!(removed, "Cleared quotation cache");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear quotation cache");
                0
            }
        }
    }

    async fn evict_stale(&self) {
        let Source::Online {
            cache,
            cache_ttl: Some(ttl),
            ..
        } = &self.source
        else {
            return;
        };
        match cache.invalidate_stale(*ttl).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Evicted stale quotation frames"),
            Err(e) => warn!(error = %e, "Failed to evict stale quotation frames"),
        }
    }

    async fn fetch_code(&self, code: &StockCode, request: &MarketDataRequest) -> FetchOutcome {
        let raw = match &self.source {
            Source::Online {
                client,
                cache,
                retry,
                ..
            } => {
                fetch_online(
                    client.as_ref(),
                    cache.as_ref(),
                    *retry,
                    code,
                    frequency_code(request.period),
                    cap_count(request.count),
                    adjust_token(request.dividend_type),
                )
                .await
            }
            Source::Offline { reader } => match request.period {
                Period::Daily => reader.daily(code.bare()).await,
                Period::Minute1 | Period::Minute5 => reader.minute(code.bare()).await,
                period => {
                    warn!(%code, %period, "Period not available offline, skipping");
                    return FetchOutcome::Failed(DataError::NotSupported(format!(
                        "period {period} in offline mode"
                    )));
                }
            },
        };

        let raw = match raw {
            Ok(raw) if raw.height() == 0 => {
                warn!(%code, "Quotation backend returned no rows");
                return FetchOutcome::NoData;
            }
            Ok(raw) => raw,
            Err(e) => {
                error!(%code, error = %e, "Quotation fetch failed");
                return FetchOutcome::Failed(e);
            }
        };

        let mut df = match normalize_columns(raw, NATIVE_TIME_COLUMN, &request.fields) {
            Ok(df) => df,
            Err(e) => {
                warn!(%code, error = %e, "Could not normalize quotation table");
                return FetchOutcome::Failed(e);
            }
        };

        if let (Some(start), Some(end)) = (request.start, request.end) {
            df = filter_by_date_range(df, start, end);
        }

        if let Source::Offline { .. } = self.source {
            if let Some(n) = request.count.filter(|&n| n > 0) {
                df = df.tail(Some(n));
            }
        }

        debug!(%code, rows = df.height(), "Quotation table ready");
        FetchOutcome::from_frame(df)
    }

    async fn security_codes(client: &dyn QuoteClient, market: u8, exchange: Exchange) -> Vec<StockCode> {
        match client.security_list(market).await.and_then(|df| code_column(&df)) {
            Ok(codes) => codes
                .iter()
                .map(|c| StockCode::with_exchange(c, exchange))
                .collect(),
            Err(e) => {
                error!(%exchange, error = %e, "Failed to list securities");
                Vec::new()
            }
        }
    }
}

fn connect_error(e: DataError) -> DataError {
    if e.is_construction() {
        e
    } else {
        DataError::BackendUnreachable {
            backend: ProviderKind::Quotes.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Reads the `code` column of a list frame.
fn code_column(df: &DataFrame) -> Result<Vec<String>> {
    Ok(df
        .column(CODE_COLUMN)?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

/// Fetches raw bars through the cache, retrying failed calls with backoff.
///
/// Empty frames are returned without being cached.
async fn fetch_online(
    client: &dyn QuoteClient,
    cache: &dyn BarCache,
    retry: RetryPolicy,
    code: &StockCode,
    frequency: u8,
    offset: usize,
    adjust: &str,
) -> Result<DataFrame> {
    let symbol = code.bare();
    let index = is_index(code);
    let key = BarKey::new(symbol, frequency, offset, adjust, index);

    match cache.get(&key).await {
        Ok(Some(df)) => return Ok(df),
        Ok(None) => {}
        Err(e) => warn!(%code, error = %e, "Cache lookup failed"),
    }

    debug!(%code, frequency, offset, index, "Fetching quotation bars");

    let attempts = retry.max_attempts.max(1);
    let mut last_error = None;
    for attempt in 0..attempts {
        let result = if index {
            client.index_bars(symbol, frequency, offset).await
        } else {
            client.bars(symbol, frequency, offset, adjust).await
        };

        match result {
            Ok(df) => {
                if df.height() > 0 {
                    if let Err(e) = cache.put(key, &df).await {
                        warn!(%code, error = %e, "Failed to cache bars");
                    }
                }
                return Ok(df);
            }
            Err(e) => {
                warn!(%code, attempt = attempt + 1, attempts, error = %e, "Quotation call failed");
                last_error = Some(e);
                if attempt + 1 < attempts {
                    sleep(retry.backoff(attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| DataError::Backend(format!("no attempt made for {code}"))))
}

#[async_trait]
impl MarketDataProvider for QuotesAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Quotes
    }

    fn name(&self) -> &str {
        match self.source {
            Source::Online { .. } => "quotes-online",
            Source::Offline { .. } => "quotes-offline",
        }
    }

    async fn download_history_data(
        &self,
        codes: &[StockCode],
        _period: Period,
        _start: Option<NaiveDate>,
        _end: Option<NaiveDate>,
        _options: &DownloadOptions,
    ) -> bool {
        debug!(codes = codes.len(), "Quotation bars load on demand, nothing to download");
        true
    }

    async fn fetch_market_data(&self, request: &MarketDataRequest) -> MarketDataOutcomes {
        self.evict_stale().await;

        let mut outcomes = MarketDataOutcomes::new();
        for code in &request.codes {
            let outcome = self.fetch_code(code, request).await;
            outcomes.insert(code.clone(), outcome);
        }
        outcomes
    }

    async fn get_stock_list_in_sector(&self, sector_name: &str) -> Vec<StockCode> {
        let Source::Online { client, .. } = &self.source else {
            warn!(sector = sector_name, "Sector members are not available offline");
            return Vec::new();
        };

        match client.block_stocks(sector_name).await.and_then(|df| code_column(&df)) {
            Ok(codes) => codes.into_iter().map(StockCode::new).collect(),
            Err(e) => {
                error!(sector = sector_name, error = %e, "Failed to list sector members");
                Vec::new()
            }
        }
    }

    async fn get_stock_list(&self, market: SecurityKind) -> Vec<StockCode> {
        let Source::Online { client, .. } = &self.source else {
            warn!(%market, "Security lists are not available offline");
            return Vec::new();
        };

        let mut codes = Self::security_codes(client.as_ref(), MARKET_SH, Exchange::Shanghai).await;
        codes.extend(Self::security_codes(client.as_ref(), MARKET_SZ, Exchange::Shenzhen).await);
        codes.retain(|code| classify_security(code) == Some(market));
        codes
    }

    async fn get_sector_list(&self) -> Vec<String> {
        COMMON_SECTORS.iter().map(|s| s.to_string()).collect()
    }

    async fn download_sector_data(&self) -> bool {
        debug!("Quotation sectors load on demand, nothing to download");
        true
    }

    async fn get_instrument_detail(&self, code: &StockCode) -> Option<InstrumentDetail> {
        match code.exchange() {
            Some(exchange) => Some(InstrumentDetail::new(code.clone(), Some(exchange))),
            None => {
                debug!(%code, "Cannot determine exchange");
                None
            }
        }
    }
}
