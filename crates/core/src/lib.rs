pub mod clock;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use futures::future::join_all;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

use clock::{Clock, SystemClock};
use errors::CoreError;
use models::{
    asset::AssetClass,
    dividend::{DividendPayment, DividendTotal, MonthlyDividend, Period},
    ledger::InstrumentLedger,
    position::{HistoricalPosition, InvestmentTotals, MonthlyPosition, MonthlyTotal, ValuedPosition},
    price::ResponseCache,
    settings::Settings,
    transaction::Transaction,
};
use providers::cached::{shared_cache, SharedCache};
use providers::registry::ProviderRegistry;
use services::{
    accounting_service::AccountingService,
    aggregation_service::{AggregationService, GroupBy},
    loader_service::LoaderService,
    resample_service::ResampleService,
    valuation_service::{DividendBook, QuoteBook, ValuationService},
};
#[cfg(not(target_arch = "wasm32"))]
use storage::manager::CacheStore;

/// Main entry point for the portfolio tracker core library.
///
/// Holds the transactions of one asset class, their ledgers and all
/// services needed to value them. Ledgers are rebuilt from the
/// transactions on construction; everything else is computed on demand.
#[must_use]
pub struct PortfolioTracker {
    asset_class: AssetClass,
    transactions: Vec<Transaction>,
    ledgers: Vec<InstrumentLedger>,
    settings: Settings,
    registry: ProviderRegistry,
    /// True while `registry` holds the bundled providers built by `build`.
    default_registry: bool,
    cache: Option<SharedCache>,
    clock: Arc<dyn Clock>,
    resample_service: ResampleService,
    valuation_service: ValuationService,
    aggregation_service: AggregationService,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("asset_class", &self.asset_class)
            .field("transactions", &self.transactions.len())
            .field("tickers", &self.ledgers.len())
            .field("providers", &self.registry.provider_names(self.asset_class))
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl PortfolioTracker {
    /// Build a tracker from already parsed transactions, using the bundled
    /// providers and the system clock.
    pub fn from_transactions(asset_class: AssetClass, transactions: Vec<Transaction>) -> Self {
        Self::build(asset_class, transactions, Settings::default())
    }

    /// Parse a transaction file's contents.
    pub fn load_from_str(asset_class: AssetClass, content: &str, settings: Settings) -> Result<Self, CoreError> {
        let transactions = LoaderService::new(settings.loader.clone()).load_from_str(content)?;
        Ok(Self::build(asset_class, transactions, settings))
    }

    /// Load a transaction file from disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(asset_class: AssetClass, path: &str, settings: Settings) -> Result<Self, CoreError> {
        let transactions = LoaderService::new(settings.loader.clone()).load_from_file(path)?;
        Ok(Self::build(asset_class, transactions, settings))
    }

    /// Load the transaction file configured for `asset_class`, and open the
    /// response cache when the settings name a cache path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_settings(asset_class: AssetClass, settings: Settings) -> Result<Self, CoreError> {
        let path = settings.transaction_file(asset_class).to_string();
        let cache_path = settings.cache.path.clone();
        let tracker = Self::load_from_file(asset_class, &path, settings)?;
        Ok(match cache_path {
            Some(cache_path) => tracker.with_cache(CacheStore::load_or_default(&cache_path)),
            None => tracker,
        })
    }

    fn build(asset_class: AssetClass, transactions: Vec<Transaction>, settings: Settings) -> Self {
        let accounting_service = AccountingService::new();
        let mut transactions = transactions;
        AccountingService::sort_transactions(&mut transactions);
        let ledgers = accounting_service.build_ledgers(&transactions);

        Self {
            asset_class,
            transactions,
            ledgers,
            settings,
            registry: ProviderRegistry::new_with_defaults(),
            default_registry: true,
            cache: None,
            clock: Arc::new(SystemClock),
            resample_service: ResampleService::new(),
            valuation_service: ValuationService::new(),
            aggregation_service: AggregationService::new(),
        }
    }

    /// Replace the provider registry.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self.default_registry = false;
        self
    }

    /// Replace the clock used for "now" and for cache expiry. The bundled
    /// providers, if still in use, are rebuilt on the new clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if self.default_registry {
            self.registry = ProviderRegistry::with_default_providers(Arc::clone(&clock));
        }
        self.clock = clock;
        self
    }

    /// Put the currently registered providers behind a response cache.
    ///
    /// Quotes expire after `cache.quote_ttl_days`, dividends after the
    /// asset class's dividend TTL. Call after `with_registry`/`with_clock`.
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        let shared = shared_cache(cache);
        let registry = std::mem::take(&mut self.registry);
        self.registry = registry.into_cached(
            Arc::clone(&shared),
            self.settings.cache.quote_ttl(),
            self.settings.cache.dividend_ttl(self.asset_class),
            Arc::clone(&self.clock),
        );
        self.cache = Some(shared);
        self.default_registry = false;
        self
    }

    /// Copy of the response cache, if one is attached.
    pub fn cache_snapshot(&self) -> Option<ResponseCache> {
        self.cache
            .as_ref()
            .map(|c| c.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone())
    }

    /// Write the response cache to the configured path. No-op without a
    /// cache or a path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_cache(&self) -> Result<(), CoreError> {
        match (self.cache_snapshot(), self.settings.cache.path.as_deref()) {
            (Some(cache), Some(path)) => CacheStore::save_to_file(&cache, path),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Transactions & ledgers ──────────────────────────────────────

    /// Transactions in ledger order, optionally for one ticker (case-insensitive).
    #[must_use]
    pub fn transactions(&self, ticker: Option<&str>) -> Vec<&Transaction> {
        let ticker = ticker.map(str::to_uppercase);
        self.transactions
            .iter()
            .filter(|t| ticker.as_deref().map_or(true, |wanted| t.ticker == wanted))
            .collect()
    }

    /// Every ticker's ledger, ordered by ticker.
    #[must_use]
    pub fn ledgers(&self) -> &[InstrumentLedger] {
        &self.ledgers
    }

    #[must_use]
    pub fn ledger(&self, ticker: &str) -> Option<&InstrumentLedger> {
        let ticker = ticker.to_uppercase();
        self.ledgers.iter().find(|l| l.ticker == ticker)
    }

    fn ledgers_for(&self, ticker: Option<&str>) -> Vec<InstrumentLedger> {
        match ticker {
            Some(ticker) => self.ledger(ticker).into_iter().cloned().collect(),
            None => self.ledgers.clone(),
        }
    }

    // ── Positions ───────────────────────────────────────────────────

    /// Month-end snapshots through the current month.
    #[must_use]
    pub fn monthly_position(&self, ticker: Option<&str>) -> Vec<MonthlyPosition> {
        self.resample_service
            .monthly_positions(&self.ledgers_for(ticker), self.clock.now())
    }

    /// Held tickers valued at their latest quote.
    pub async fn current_position(&self, ticker: Option<&str>) -> Vec<ValuedPosition> {
        let ledgers = self.ledgers_for(ticker);
        let held: Vec<&InstrumentLedger> = ledgers.iter().filter(|l| !l.is_liquidated()).collect();
        let quotes = self.quote_book(&held).await;
        self.valuation_service.current_positions(&ledgers, &quotes)
    }

    /// Daily value of each held ticker from its first transaction to today.
    /// Tickers whose price series cannot be fetched are left out.
    pub async fn historical_position_prices(&self, ticker: Option<&str>) -> Vec<HistoricalPosition> {
        let ledgers = self.ledgers_for(ticker);
        let today = self.clock.today();

        let requests = ledgers
            .iter()
            .filter(|l| !l.is_liquidated())
            .filter_map(|l| l.first().map(|first| (l, first.date)))
            .map(|(ledger, from)| async move {
                let series = self
                    .registry
                    .get_price_series(self.asset_class, &ledger.ticker, ledger.exchange(), from, today)
                    .await;
                (ledger, series)
            });

        let mut rows = Vec::new();
        for (ledger, series) in join_all(requests).await {
            match series {
                Ok(points) => rows.extend(self.valuation_service.historical_positions(ledger, &points)),
                Err(e) => warn!("Price series for {} unavailable: {e}", ledger.ticker),
            }
        }
        rows
    }

    // ── Dividends ───────────────────────────────────────────────────

    /// Month-end positions joined with the dividend declared that month.
    pub async fn monthly_dividends(&self, ticker: Option<&str>, sort_date_ascending: bool) -> Vec<MonthlyDividend> {
        let ledgers = self.ledgers_for(ticker);
        let positions = self.resample_service.monthly_positions(&ledgers, self.clock.now());
        let all: Vec<&InstrumentLedger> = ledgers.iter().collect();

        let (dividends, quotes) = futures::join!(self.dividend_book(&all), self.quote_book(&all));
        self.valuation_service
            .monthly_dividends(&positions, &dividends, &quotes, sort_date_ascending)
    }

    /// Dividend events paid on the units held at each event date.
    pub async fn dividend_payments(&self, ticker: Option<&str>) -> Vec<DividendPayment> {
        let ledgers = self.ledgers_for(ticker);
        let all: Vec<&InstrumentLedger> = ledgers.iter().collect();
        let dividends = self.dividend_book(&all).await;
        self.valuation_service.dividend_payments(&ledgers, &dividends)
    }

    /// Income per year or month and ticker.
    ///
    /// Real-estate funds sum their monthly dividends; other classes sum
    /// dividend payments.
    pub async fn dividends_received(&self, ticker: Option<&str>, period: Period) -> Vec<DividendTotal> {
        match self.asset_class {
            AssetClass::RealEstateFund => {
                let rows = self.monthly_dividends(ticker, true).await;
                self.aggregation_service.dividends_received(&rows, period)
            }
            AssetClass::Stock | AssetClass::MutualFund => {
                let rows = self.dividend_payments(ticker).await;
                self.aggregation_service.dividends_received(&rows, period)
            }
        }
    }

    /// Portfolio dividend yield at current prices, `None` when nothing is priced.
    pub async fn total_dividend_yield(&self) -> Option<f64> {
        let rows = self.monthly_dividends(None, true).await;
        self.aggregation_service.total_dividend_yield(&rows)
    }

    // ── Totals ──────────────────────────────────────────────────────

    pub async fn total_invest(&self) -> InvestmentTotals {
        let positions = self.current_position(None).await;
        self.aggregation_service.total_invest(&positions)
    }

    pub async fn total_invest_by(&self, group_by: GroupBy) -> BTreeMap<Option<String>, InvestmentTotals> {
        let positions = self.current_position(None).await;
        self.aggregation_service.total_invest_by(&positions, group_by)
    }

    /// Return over priced positions, `None` when nothing is priced.
    pub async fn total_return(&self) -> Option<f64> {
        let positions = self.current_position(None).await;
        self.aggregation_service.total_return(&positions)
    }

    #[must_use]
    pub fn total_invest_monthly(&self) -> Vec<MonthlyTotal> {
        let positions = self.monthly_position(None);
        self.aggregation_service.total_invest_monthly(&positions)
    }

    // ── Lookups ─────────────────────────────────────────────────────

    /// Latest quotes for `ledgers`, fetched concurrently. Misses are logged
    /// and left out of the book.
    async fn quote_book(&self, ledgers: &[&InstrumentLedger]) -> QuoteBook {
        let requests = ledgers.iter().map(|&ledger| async move {
            let price = self
                .registry
                .get_price(self.asset_class, &ledger.ticker, ledger.exchange(), None)
                .await;
            (ledger.ticker.as_str(), price)
        });

        let mut book = QuoteBook::new();
        for (ticker, price) in join_all(requests).await {
            match price {
                Ok(price) => book.insert(ticker, price),
                Err(e) if e.is_lookup_miss() => debug!("No quote for {ticker}: {e}"),
                Err(e) => warn!("Quote lookup for {ticker} failed: {e}"),
            }
        }
        book
    }

    /// Dividend histories since each ticker's first transaction.
    async fn dividend_book(&self, ledgers: &[&InstrumentLedger]) -> DividendBook {
        let requests = ledgers
            .iter()
            .filter_map(|&l| l.first().map(|first| (l, first.date)))
            .map(|(ledger, start)| async move {
                let events = self
                    .registry
                    .get_dividends(self.asset_class, &ledger.ticker, ledger.exchange(), start)
                    .await;
                (ledger.ticker.as_str(), events)
            });

        let mut book = DividendBook::new();
        for (ticker, events) in join_all(requests).await {
            match events {
                Ok(events) => book.insert(ticker, events),
                Err(e) => warn!("Dividend lookup for {ticker} failed: {e}"),
            }
        }
        book
    }
}
