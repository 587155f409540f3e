// ═══════════════════════════════════════════════════════════════════
// Integration Tests: PortfolioTracker facade end to end with mock
// providers and a pinned clock
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use portfolio_tracker_core::clock::FixedClock;
use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::asset::AssetClass;
use portfolio_tracker_core::models::dividend::{DividendEvent, Period, PeriodKey};
use portfolio_tracker_core::models::price::{PricePoint, ResponseCache};
use portfolio_tracker_core::models::settings::Settings;
use portfolio_tracker_core::providers::registry::ProviderRegistry;
use portfolio_tracker_core::providers::traits::{DividendProvider, QuoteProvider};
use portfolio_tracker_core::services::aggregation_service::GroupBy;
use portfolio_tracker_core::storage::manager::CacheStore;
use portfolio_tracker_core::PortfolioTracker;

fn make_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

const FII_FILE: &str = "\
Date;Ticker;Operation;Quantity;Unit Price;Broker;Stock Exchange
10/03/2020;AAA11;Compra;10;100,00;XP;B3
11/03/2020;AAA11;Compra;10;200,00;XP;B3
10/05/2020;AAA11;Compra;10;100,00;XP;B3
10/07/2020;AAA11;Compra;10;100,00;XP;B3
10/07/2020;AAA11;Compra;10;100,00;XP;B3
10/08/2020;AAA11;Venda;10;100,00;XP;B3
10/08/2020;BBB11;Compra;50;120,00;Rico;B3
10/11/2020;BBB11;Compra;20;110,00;Rico;B3
15/01/2020;CCC11;Compra;10;90,00;XP;B3
20/02/2020;CCC11;Venda;10;95,00;XP;B3
";

// ═══════════════════════════════════════════════════════════════════
// Mock Providers
// ═══════════════════════════════════════════════════════════════════

struct MockQuotes {
    prices: HashMap<String, f64>,
    calls: Arc<AtomicUsize>,
}

impl MockQuotes {
    fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl QuoteProvider for MockQuotes {
    fn name(&self) -> &str {
        "MockQuotes"
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        vec![AssetClass::Stock, AssetClass::RealEstateFund]
    }

    async fn get_price(
        &self,
        ticker: &str,
        _exchange: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> Result<f64, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .get(ticker)
            .copied()
            .ok_or_else(|| CoreError::PriceNotAvailable {
                ticker: ticker.into(),
                date: as_of.map(|d| d.to_string()).unwrap_or_else(|| "latest".into()),
            })
    }

    async fn get_price_series(
        &self,
        ticker: &str,
        _exchange: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let price = self
            .prices
            .get(ticker)
            .copied()
            .ok_or_else(|| CoreError::PriceNotAvailable {
                ticker: ticker.into(),
                date: to.to_string(),
            })?;
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| PricePoint { date, price })
            .collect())
    }
}

struct MockDividends {
    events: HashMap<String, Vec<DividendEvent>>,
    class: AssetClass,
}

#[async_trait]
impl DividendProvider for MockDividends {
    fn name(&self) -> &str {
        "MockDividends"
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        vec![self.class]
    }

    async fn get_dividends(
        &self,
        ticker: &str,
        _exchange: Option<&str>,
        start: NaiveDate,
    ) -> Result<Vec<DividendEvent>, CoreError> {
        let events = self
            .events
            .get(ticker)
            .ok_or_else(|| CoreError::DividendsNotAvailable {
                ticker: ticker.into(),
            })?;
        Ok(events
            .iter()
            .filter(|e| e.declared_date >= start)
            .cloned()
            .collect())
    }
}

fn event(declared: NaiveDate, amount: f64) -> DividendEvent {
    DividendEvent {
        declared_date: declared,
        pay_date: None,
        amount_per_unit: amount,
    }
}

fn dividends(class: AssetClass) -> MockDividends {
    let mut events = HashMap::new();
    events.insert(
        "AAA11".to_string(),
        vec![event(make_date(2020, 4, 2), 0.9), event(make_date(2020, 12, 10), 1.0)],
    );
    events.insert("BBB11".to_string(), vec![event(make_date(2020, 9, 10), 1.2)]);
    MockDividends { events, class }
}

fn registry(quotes: MockQuotes, class: AssetClass) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_quotes(Box::new(quotes));
    registry.register_dividends(Box::new(dividends(class)));
    registry
}

fn fii_tracker(quotes: MockQuotes) -> PortfolioTracker {
    PortfolioTracker::load_from_str(AssetClass::RealEstateFund, FII_FILE, Settings::default())
        .unwrap()
        .with_registry(registry(quotes, AssetClass::RealEstateFund))
        .with_clock(Arc::new(FixedClock::at_date(make_date(2021, 1, 1))))
}

// ═══════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════

mod loading {
    use super::*;

    #[test]
    fn load_from_str_builds_ledgers() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        assert_eq!(tracker.asset_class(), AssetClass::RealEstateFund);
        assert_eq!(tracker.transactions(None).len(), 10);
        assert_eq!(tracker.transactions(Some("bbb11")).len(), 2);

        let tickers: Vec<&str> = tracker.ledgers().iter().map(|l| l.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAA11", "BBB11", "CCC11"]);
        assert_eq!(tracker.ledger("aaa11").unwrap().last().unwrap().adjusted_cost, 5000.0);
        assert!(tracker.ledger("ZZZ11").is_none());
    }

    #[test]
    fn transactions_come_back_in_ledger_order() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        let first = tracker.transactions(None)[0];
        assert_eq!(first.ticker, "AAA11");
        assert_eq!(first.date, make_date(2020, 3, 10));
    }

    #[test]
    fn load_errors_propagate() {
        let err = PortfolioTracker::load_from_str(
            AssetClass::Stock,
            "Date;Ticker;Operation;Quantity;Unit Price\n01/01/2021;PETR4;Doação;1;10",
            Settings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Parse { line: 2, .. }));
    }

    #[test]
    fn load_from_file_and_settings() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "{FII_FILE}").unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let tracker =
            PortfolioTracker::load_from_file(AssetClass::RealEstateFund, &path, Settings::default()).unwrap();
        assert_eq!(tracker.ledgers().len(), 3);

        let mut settings = Settings::default();
        settings.transaction_files.insert(AssetClass::RealEstateFund, path);
        let tracker = PortfolioTracker::load_from_settings(AssetClass::RealEstateFund, settings).unwrap();
        assert_eq!(tracker.transactions(None).len(), 10);
        assert!(tracker.cache_snapshot().is_none());
    }

    #[test]
    fn from_transactions() {
        let tracker = PortfolioTracker::from_transactions(
            AssetClass::Stock,
            vec![portfolio_tracker_core::models::transaction::Transaction::buy(
                make_date(2021, 1, 4),
                "PETR4",
                100.0,
                28.5,
            )],
        );
        assert_eq!(tracker.ledgers().len(), 1);
        assert!(format!("{tracker:?}").contains("PortfolioTracker"));
    }

    #[test]
    fn mutual_funds_are_priced_by_default() {
        let tracker = PortfolioTracker::from_transactions(
            AssetClass::MutualFund,
            vec![portfolio_tracker_core::models::transaction::Transaction::buy(
                make_date(2021, 1, 4),
                "97.929.213/0001-34",
                1000.0,
                2.34,
            )],
        )
        .with_clock(Arc::new(FixedClock::at_date(make_date(2021, 1, 1))));
        assert!(format!("{tracker:?}").contains("CVM"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Positions and totals
// ═══════════════════════════════════════════════════════════════════

mod positions {
    use super::*;

    #[tokio::test]
    async fn current_position_at_a_flat_quote() {
        let tracker = fii_tracker(MockQuotes::new(&[("AAA11", 150.0), ("BBB11", 150.0), ("CCC11", 150.0)]));
        let rows = tracker.current_position(None).await;

        // CCC11 was fully sold.
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].current_value, Some(6000.0));
        assert_close(rows[0].gain_loss_pct.unwrap(), 20.0);
        assert_eq!(rows[1].current_value, Some(10500.0));
        assert_close(rows[1].gain_loss_pct.unwrap(), 28.048781);
    }

    #[tokio::test]
    async fn current_position_for_one_ticker() {
        let tracker = fii_tracker(MockQuotes::new(&[("AAA11", 150.0), ("BBB11", 150.0)]));
        let rows = tracker.current_position(Some("bbb11")).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker, "BBB11");
        assert_eq!(rows[0].broker.as_deref(), Some("Rico"));
    }

    #[tokio::test]
    async fn a_missing_quote_only_affects_its_ticker() {
        let tracker = fii_tracker(MockQuotes::new(&[("AAA11", 150.0)]));
        let rows = tracker.current_position(None).await;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].current_value, Some(6000.0));
        assert_eq!(rows[1].current_value, None);

        let totals = tracker.total_invest().await;
        assert_eq!(totals.invested, 13200.0);
        assert_eq!(totals.current_value, 6000.0);
        assert_eq!(totals.unpriced, vec!["BBB11".to_string()]);
        assert_close(tracker.total_return().await.unwrap(), 20.0);
    }

    #[tokio::test]
    async fn totals_by_broker() {
        let tracker = fii_tracker(MockQuotes::new(&[("AAA11", 150.0), ("BBB11", 150.0)]));
        let groups = tracker.total_invest_by(GroupBy::Broker).await;

        assert_eq!(groups[&Some("XP".to_string())].invested, 5000.0);
        assert_eq!(groups[&Some("Rico".to_string())].current_value, 10500.0);
        assert_close(tracker.total_return().await.unwrap(), 25.0);
    }

    #[tokio::test]
    async fn nothing_priced() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        assert_eq!(tracker.total_return().await, None);
    }

    #[test]
    fn monthly_position_uses_the_clock() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        let rows = tracker.monthly_position(Some("AAA11"));

        assert_eq!(rows.len(), 11);
        assert_eq!(rows.first().unwrap().date, make_date(2020, 3, 31));
        assert_eq!(rows.last().unwrap().date, make_date(2021, 1, 31));
        assert_eq!(rows.last().unwrap().adjusted_cost, 5000.0);

        // CCC11 stays in the series after liquidation.
        let ccc = tracker.monthly_position(Some("CCC11"));
        assert_eq!(ccc.len(), 13);
        assert!(ccc[1..].iter().all(|r| r.adjusted_quantity == 0.0));
    }

    #[test]
    fn total_invest_monthly() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        let totals = tracker.total_invest_monthly();

        let january = totals.first().unwrap();
        assert_eq!(january.date, make_date(2020, 1, 31));
        assert_eq!(january.adjusted_cost, 900.0);

        let last = totals.last().unwrap();
        assert_eq!(last.date, make_date(2021, 1, 31));
        assert_eq!(last.adjusted_cost, 13200.0);
    }

    #[tokio::test]
    async fn historical_position_prices() {
        let tracker = fii_tracker(MockQuotes::new(&[("BBB11", 130.0)]));
        let rows = tracker.historical_position_prices(None).await;

        // AAA11 has no series and CCC11 is liquidated.
        assert!(rows.iter().all(|r| r.ticker == "BBB11"));
        assert_eq!(rows.first().unwrap().date, make_date(2020, 8, 10));
        assert_eq!(rows.last().unwrap().date, make_date(2021, 1, 1));
        assert_eq!(rows.first().unwrap().position_value, 6500.0);
        assert_eq!(rows.last().unwrap().position_value, 9100.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Dividends
// ═══════════════════════════════════════════════════════════════════

mod dividend_income {
    use super::*;

    #[tokio::test]
    async fn monthly_dividends_for_real_estate_funds() {
        let tracker = fii_tracker(MockQuotes::new(&[("AAA11", 150.0), ("BBB11", 120.0)]));
        let rows = tracker.monthly_dividends(None, true).await;

        let keys: Vec<(NaiveDate, &str)> = rows.iter().map(|r| (r.date, r.ticker.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (make_date(2020, 4, 30), "AAA11"),
                (make_date(2020, 9, 30), "BBB11"),
                (make_date(2020, 12, 31), "AAA11"),
            ]
        );
        assert_close(rows[0].amount_received, 18.0);
        assert_close(rows[1].dividend_yield.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn dividends_received_by_year() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        let totals = tracker.dividends_received(None, Period::Year).await;

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].period, PeriodKey::Year(2020));
        assert_eq!(totals[0].ticker, "AAA11");
        assert_close(totals[0].amount_received, 18.0 + 40.0);
        assert_close(totals[1].amount_received, 60.0);
    }

    #[tokio::test]
    async fn total_dividend_yield() {
        let tracker = fii_tracker(MockQuotes::new(&[("AAA11", 100.0), ("BBB11", 120.0)]));
        // AAA11 December: 40 received on 40 × 100; BBB11 September: 60 on 50 × 120.
        assert_close(tracker.total_dividend_yield().await.unwrap(), 100.0 / 10000.0 * 100.0);
    }

    #[tokio::test]
    async fn stock_dividend_payments() {
        let tracker = PortfolioTracker::load_from_str(AssetClass::Stock, FII_FILE, Settings::default())
            .unwrap()
            .with_registry(registry(MockQuotes::new(&[]), AssetClass::Stock))
            .with_clock(Arc::new(FixedClock::at_date(make_date(2021, 1, 1))));

        let payments = tracker.dividend_payments(None).await;
        assert_eq!(payments.len(), 3);
        assert_eq!(payments[0].units, 20.0);

        let totals = tracker.dividends_received(Some("AAA11"), Period::Month).await;
        let periods: Vec<String> = totals.iter().map(|t| t.period.to_string()).collect();
        assert_eq!(periods, vec!["2020-04", "2020-12"]);
    }

    #[tokio::test]
    async fn missing_dividend_history_is_skipped() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        // CCC11 has no dividend history at all.
        let rows = tracker.monthly_dividends(Some("CCC11"), true).await;
        assert!(rows.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Response cache
// ═══════════════════════════════════════════════════════════════════

mod response_cache {
    use super::*;

    #[tokio::test]
    async fn cached_tracker_reuses_quotes() {
        let quotes = MockQuotes::new(&[("AAA11", 150.0), ("BBB11", 150.0)]);
        let calls = Arc::clone(&quotes.calls);
        let tracker = fii_tracker(quotes).with_cache(ResponseCache::new());

        tracker.current_position(None).await;
        tracker.current_position(None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let snapshot = tracker.cache_snapshot().unwrap();
        assert_eq!(snapshot.prices.len(), 2);
    }

    #[tokio::test]
    async fn cache_is_saved_to_the_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.ptrc").to_str().unwrap().to_string();

        let mut settings = Settings::default();
        settings.cache.path = Some(path.clone());

        let tracker = PortfolioTracker::load_from_str(AssetClass::RealEstateFund, FII_FILE, settings)
            .unwrap()
            .with_registry(registry(
                MockQuotes::new(&[("AAA11", 150.0)]),
                AssetClass::RealEstateFund,
            ))
            .with_clock(Arc::new(FixedClock::at_date(make_date(2021, 1, 1))))
            .with_cache(ResponseCache::new());

        tracker.monthly_dividends(None, true).await;
        tracker.save_cache().unwrap();

        let saved = CacheStore::load_from_file(&path).unwrap();
        assert_eq!(saved.prices.len(), 1);
        assert_eq!(saved.dividends.len(), 2);
    }

    #[test]
    fn save_without_cache_is_a_no_op() {
        let tracker = fii_tracker(MockQuotes::new(&[]));
        assert!(tracker.save_cache().is_ok());
    }
}
