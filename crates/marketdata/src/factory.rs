//! Provider factory owning the single active provider.

use std::fmt;
use std::sync::Arc;

use marketdata_cache::InMemoryCache;
use marketdata_core::{BarCache, DataError, MarketDataProvider, ProviderConfig, ProviderKind, Result};
use tracing::{debug, info, warn};

#[cfg(feature = "quotes")]
use marketdata_quotes::{QuotesAdapter, QuotesConnector};
#[cfg(feature = "terminal")]
use marketdata_terminal::{TerminalAdapter, TerminalConnector};

struct ActiveProvider {
    kind: ProviderKind,
    provider: Arc<dyn MarketDataProvider>,
}

/// Builds providers and keeps the active one.
///
/// At most one provider is active. [`get_provider`](Self::get_provider)
/// hands out the active instance while its kind matches the config, and
/// [`switch_provider`](Self::switch_provider) always builds a fresh one.
/// Replaced instances stay usable by whoever still holds their `Arc`.
///
/// Every method that changes the active provider takes `&mut self`; share a
/// factory across threads by wrapping it in a lock.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use marketdata::{ProviderConfig, ProviderFactory, QuotesConnector};
///
/// # async fn example(connector: Arc<dyn QuotesConnector>) -> marketdata::Result<()> {
/// let mut factory = ProviderFactory::new().with_quotes(connector);
/// let provider = factory.get_provider(&ProviderConfig::quotes_online()).await?;
/// println!("{} sectors", provider.get_sector_list().await.len());
/// # Ok(())
/// # }
/// ```
pub struct ProviderFactory {
    #[cfg(feature = "terminal")]
    terminal: Option<Arc<dyn TerminalConnector>>,
    #[cfg(feature = "quotes")]
    quotes: Option<Arc<dyn QuotesConnector>>,
    cache: Arc<dyn BarCache>,
    active: Option<ActiveProvider>,
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ProviderFactory");
        #[cfg(feature = "terminal")]
        s.field("terminal", &self.terminal.as_ref().map(|_| "registered"));
        #[cfg(feature = "quotes")]
        s.field("quotes", &self.quotes.as_ref().map(|_| "registered"));
        s.field("cache", &self.cache)
            .field("active", &self.active_kind())
            .finish()
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self {
            #[cfg(feature = "terminal")]
            terminal: None,
            #[cfg(feature = "quotes")]
            quotes: None,
            cache: Arc::new(InMemoryCache::new()),
            active: None,
        }
    }
}

impl ProviderFactory {
    /// Creates a factory with an in-memory raw-bar cache and no connectors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the connector used to reach the trading terminal.
    #[cfg(feature = "terminal")]
    #[must_use]
    pub fn with_terminal(mut self, connector: Arc<dyn TerminalConnector>) -> Self {
        self.terminal = Some(connector);
        self
    }

    /// Registers the connector used to build quotation clients.
    #[cfg(feature = "quotes")]
    #[must_use]
    pub fn with_quotes(mut self, connector: Arc<dyn QuotesConnector>) -> Self {
        self.quotes = Some(connector);
        self
    }

    /// Replaces the raw-bar cache shared by quotation providers.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn BarCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Returns the active provider if its kind matches `config`, otherwise
    /// builds one and makes it active.
    ///
    /// When building fails the previous provider stays active.
    pub async fn get_provider(
        &mut self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn MarketDataProvider>> {
        if let Some(active) = self.active.as_ref().filter(|a| a.kind == config.kind) {
            debug!(kind = %config.kind, "Reusing active provider");
            return Ok(Arc::clone(&active.provider));
        }

        let provider = self.build(config).await?;
        self.install(config.kind, Arc::clone(&provider));
        Ok(provider)
    }

    /// Discards the active provider and builds a new one for `config`.
    ///
    /// When building fails no provider is active afterwards.
    pub async fn switch_provider(
        &mut self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn MarketDataProvider>> {
        if let Some(previous) = self.active.take() {
            info!(from = %previous.kind, to = %config.kind, "Switching provider");
        }

        let provider = self.build(config).await?;
        self.install(config.kind, Arc::clone(&provider));
        Ok(provider)
    }

    /// The active provider, if any.
    #[must_use]
    pub fn active(&self) -> Option<Arc<dyn MarketDataProvider>> {
        self.active.as_ref().map(|a| Arc::clone(&a.provider))
    }

    /// Kind of the active provider, if any.
    #[must_use]
    pub fn active_kind(&self) -> Option<ProviderKind> {
        self.active.as_ref().map(|a| a.kind)
    }

    /// Drops the active provider.
    pub fn clear(&mut self) {
        if let Some(previous) = self.active.take() {
            debug!(kind = %previous.kind, "Cleared active provider");
        }
    }

    /// Empties the shared raw-bar cache, returning how many frames were dropped.
    pub async fn clear_cache(&self) -> usize {
        match self.cache.clear().await {
            Ok(removed) => {
                info!(removed, "Cleared raw-bar cache");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear raw-bar cache");
                0
            }
        }
    }

    fn install(&mut self, kind: ProviderKind, provider: Arc<dyn MarketDataProvider>) {
        info!(%kind, provider = provider.name(), "Provider active");
        self.active = Some(ActiveProvider { kind, provider });
    }

    async fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn MarketDataProvider>> {
        match config.kind {
            ProviderKind::Terminal => self.build_terminal().await,
            ProviderKind::Quotes => self.build_quotes(config).await,
        }
    }

    #[cfg(feature = "terminal")]
    async fn build_terminal(&self) -> Result<Arc<dyn MarketDataProvider>> {
        let connector = self.terminal.as_ref().ok_or_else(|| {
            DataError::DependencyMissing("no terminal connector registered".into())
        })?;
        Ok(Arc::new(TerminalAdapter::connect(connector.as_ref()).await?))
    }

    #[cfg(not(feature = "terminal"))]
    async fn build_terminal(&self) -> Result<Arc<dyn MarketDataProvider>> {
        Err(DataError::DependencyMissing(
            "terminal support is not compiled in".into(),
        ))
    }

    #[cfg(feature = "quotes")]
    async fn build_quotes(&self, config: &ProviderConfig) -> Result<Arc<dyn MarketDataProvider>> {
        config.validate()?;
        let connector = self.quotes.as_ref().ok_or_else(|| {
            DataError::DependencyMissing("no quotation connector registered".into())
        })?;
        let adapter =
            QuotesAdapter::connect(connector.as_ref(), config, Arc::clone(&self.cache)).await?;
        Ok(Arc::new(adapter))
    }

    #[cfg(not(feature = "quotes"))]
    async fn build_quotes(&self, config: &ProviderConfig) -> Result<Arc<dyn MarketDataProvider>> {
        config.validate()?;
        Err(DataError::DependencyMissing(
            "quotation support is not compiled in".into(),
        ))
    }
}

#[cfg(all(test, feature = "terminal", feature = "quotes"))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marketdata_core::{BarKey, MarketDataRequest, QuotesMode, RetryPolicy, StockCode};
    use marketdata_quotes::{OfflineReader, QuoteClient};
    use marketdata_terminal::{RawInstrument, TerminalApi};
    use polars::prelude::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct EmptyTerminal;

    #[async_trait]
    impl TerminalApi for EmptyTerminal {
        async fn download_history_data2(
            &self,
            _codes: &[String],
            _period: &str,
            _start: &str,
            _end: &str,
            _incremental: bool,
        ) -> Result<()> {
            Ok(())
        }

        async fn get_market_data_ex(
            &self,
            _fields: &[String],
            _codes: &[String],
            _period: &str,
            _start: &str,
            _end: &str,
            _count: i64,
            _dividend_type: &str,
        ) -> Result<HashMap<String, DataFrame>> {
            Ok(HashMap::new())
        }

        async fn get_stock_list_in_sector(&self, _sector_name: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_sector_list(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn download_sector_data(&self) -> Result<()> {
            Ok(())
        }

        async fn get_instrument_detail(&self, _code: &str) -> Result<Option<RawInstrument>> {
            Ok(None)
        }
    }

    #[derive(Debug, Default)]
    struct TerminalStub {
        refuse: bool,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl TerminalConnector for TerminalStub {
        async fn connect(&self) -> Result<Arc<dyn TerminalApi>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(DataError::Backend("connection refused".into()));
            }
            Ok(Arc::new(EmptyTerminal))
        }
    }

    #[derive(Debug)]
    struct OneBarClient;

    #[async_trait]
    impl QuoteClient for OneBarClient {
        async fn bars(
            &self,
            _symbol: &str,
            _frequency: u8,
            _offset: usize,
            _adjust: &str,
        ) -> Result<DataFrame> {
            Ok(DataFrame::new(vec![
                Column::new("date".into(), vec![1_704_178_800_000i64]),
                Column::new("close".into(), vec![35.5]),
            ])?)
        }

        async fn index_bars(&self, symbol: &str, frequency: u8, offset: usize) -> Result<DataFrame> {
            self.bars(symbol, frequency, offset, "").await
        }

        async fn block_stocks(&self, _block_name: &str) -> Result<DataFrame> {
            Ok(DataFrame::empty())
        }

        async fn security_list(&self, _market: u8) -> Result<DataFrame> {
            Ok(DataFrame::empty())
        }
    }

    #[derive(Debug)]
    struct NoFiles;

    #[async_trait]
    impl OfflineReader for NoFiles {
        async fn daily(&self, _symbol: &str) -> Result<DataFrame> {
            Ok(DataFrame::empty())
        }

        async fn minute(&self, _symbol: &str) -> Result<DataFrame> {
            Ok(DataFrame::empty())
        }
    }

    #[derive(Debug)]
    struct QuotesStub;

    #[async_trait]
    impl QuotesConnector for QuotesStub {
        async fn online(&self) -> Result<Arc<dyn QuoteClient>> {
            Ok(Arc::new(OneBarClient))
        }

        async fn offline(&self, _data_dir: &Path) -> Result<Arc<dyn OfflineReader>> {
            Ok(Arc::new(NoFiles))
        }
    }

    fn factory() -> ProviderFactory {
        ProviderFactory::new()
            .with_terminal(Arc::new(TerminalStub::default()))
            .with_quotes(Arc::new(QuotesStub))
    }

    #[tokio::test]
    async fn test_get_provider_reuses_instance() {
        let mut factory = factory();
        assert!(factory.active().is_none());

        let first = factory.get_provider(&ProviderConfig::terminal()).await.unwrap();
        let second = factory.get_provider(&ProviderConfig::terminal()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.active_kind(), Some(ProviderKind::Terminal));
    }

    #[tokio::test]
    async fn test_get_provider_replaces_other_kind() {
        let mut factory = factory();

        let terminal = factory.get_provider(&ProviderConfig::terminal()).await.unwrap();
        let quotes = factory
            .get_provider(&ProviderConfig::quotes_online())
            .await
            .unwrap();

        assert_eq!(terminal.kind(), ProviderKind::Terminal);
        assert_eq!(quotes.kind(), ProviderKind::Quotes);
        assert_eq!(factory.active_kind(), Some(ProviderKind::Quotes));

        // The replaced instance stays usable.
        assert!(terminal.get_sector_list().await.is_empty());
    }

    #[tokio::test]
    async fn test_switch_provider_always_rebuilds() {
        let connector = Arc::new(TerminalStub::default());
        let mut factory = ProviderFactory::new().with_terminal(connector.clone());

        let first = factory.get_provider(&ProviderConfig::terminal()).await.unwrap();
        let second = factory
            .switch_provider(&ProviderConfig::terminal())
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&factory.active().unwrap(), &second));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_connector() {
        let mut factory = ProviderFactory::new();

        let err = factory.get_provider(&ProviderConfig::terminal()).await.unwrap_err();
        assert!(matches!(err, DataError::DependencyMissing(_)));

        let err = factory
            .get_provider(&ProviderConfig::quotes_online())
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::DependencyMissing(_)));
        assert!(factory.active().is_none());
    }

    #[tokio::test]
    async fn test_offline_config_errors() {
        let mut factory = factory();

        let mut no_dir = ProviderConfig::quotes_online();
        no_dir.mode = QuotesMode::Offline;
        let err = factory.get_provider(&no_dir).await.unwrap_err();
        assert!(matches!(err, DataError::MissingConfig(_)));

        let bad_dir = ProviderConfig::quotes_offline("/nonexistent/quotation/data");
        let err = factory.get_provider(&bad_dir).await.unwrap_err();
        assert!(matches!(err, DataError::InvalidConfig(_)));

        let ok = ProviderConfig::quotes_offline(std::env::temp_dir());
        assert!(factory.get_provider(&ok).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let mut factory = ProviderFactory::new().with_terminal(Arc::new(TerminalStub {
            refuse: true,
            ..TerminalStub::default()
        }));

        let err = factory.get_provider(&ProviderConfig::terminal()).await.unwrap_err();
        assert!(matches!(err, DataError::BackendUnreachable { .. }));
        assert!(err.is_construction());
    }

    #[tokio::test]
    async fn test_failed_get_keeps_previous_provider() {
        let mut factory = ProviderFactory::new().with_terminal(Arc::new(TerminalStub::default()));
        factory.get_provider(&ProviderConfig::terminal()).await.unwrap();

        assert!(factory.get_provider(&ProviderConfig::quotes_online()).await.is_err());
        assert_eq!(factory.active_kind(), Some(ProviderKind::Terminal));

        assert!(factory.switch_provider(&ProviderConfig::quotes_online()).await.is_err());
        assert!(factory.active_kind().is_none());
    }

    #[tokio::test]
    async fn test_cache_survives_switch() {
        let cache = Arc::new(InMemoryCache::new());
        let mut factory = factory().with_cache(cache.clone());

        let config = ProviderConfig::quotes_online().with_retry(RetryPolicy::NONE);
        let quotes = factory.get_provider(&config).await.unwrap();
        let request = MarketDataRequest::new(["close"], ["600036"]);
        assert_eq!(quotes.get_market_data(&request).await.len(), 1);
        assert_eq!(cache.len().await, 1);

        factory.switch_provider(&ProviderConfig::terminal()).await.unwrap();
        assert!(
            cache
                .get(&BarKey::new("600036", 9, 800, "", false))
                .await
                .unwrap()
                .is_some()
        );

        assert_eq!(factory.clear_cache().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = Arc::new(InMemoryCache::new());
        let mut factory = factory().with_cache(cache.clone());

        let config = ProviderConfig::quotes_online()
            .with_cache(false)
            .with_retry(RetryPolicy::NONE);
        let quotes = factory.get_provider(&config).await.unwrap();
        let request = MarketDataRequest::new(["close"], ["600036"]);
        quotes.get_market_data(&request).await;

        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_drops_active_provider() {
        let mut factory = factory();
        let provider = factory.get_provider(&ProviderConfig::terminal()).await.unwrap();

        factory.clear();
        assert!(factory.active().is_none());
        assert_eq!(
            provider.normalize_stock_code("600036"),
            StockCode::new("600036.SH")
        );
    }
}
