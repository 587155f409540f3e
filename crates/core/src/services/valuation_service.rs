use chrono::{Datelike, NaiveDate};
use log::warn;
use std::collections::{BTreeMap, HashMap};

use crate::models::dividend::{DividendEvent, DividendPayment, MonthlyDividend};
use crate::models::ledger::{InstrumentLedger, LedgerEntry, PositionState};
use crate::models::position::{HistoricalPosition, MonthlyPosition, ValuedPosition};
use crate::models::price::PricePoint;

/// Synchronous quote lookup used by the joiner.
///
/// `date = None` asks for the latest known quote. `None` means the lookup
/// missed; the joiner turns that into missing derived values.
pub trait QuoteLookup {
    fn quote(&self, ticker: &str, exchange: Option<&str>, date: Option<NaiveDate>) -> Option<f64>;
}

impl<F> QuoteLookup for F
where
    F: Fn(&str, Option<&str>, Option<NaiveDate>) -> Option<f64>,
{
    fn quote(&self, ticker: &str, exchange: Option<&str>, date: Option<NaiveDate>) -> Option<f64> {
        self(ticker, exchange, date)
    }
}

/// Latest quotes fetched ahead of a computation, keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBook {
    quotes: HashMap<String, f64>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, price: f64) {
        self.quotes.insert(ticker.to_uppercase(), price);
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.quotes.get(&ticker.to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl FromIterator<(String, f64)> for QuoteBook {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut book = Self::new();
        for (ticker, price) in iter {
            book.insert(&ticker, price);
        }
        book
    }
}

impl QuoteLookup for QuoteBook {
    fn quote(&self, ticker: &str, _exchange: Option<&str>, _date: Option<NaiveDate>) -> Option<f64> {
        self.get(ticker)
    }
}

/// Dividend histories fetched ahead of a computation, keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DividendBook {
    dividends: HashMap<String, Vec<DividendEvent>>,
}

impl DividendBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, events: Vec<DividendEvent>) {
        self.dividends.insert(ticker.to_uppercase(), events);
    }

    /// Events for a ticker; empty when the ticker was never looked up or missed.
    pub fn get(&self, ticker: &str) -> &[DividendEvent] {
        self.dividends
            .get(&ticker.to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Earliest dividend declared in the given calendar month.
    pub fn declared_in(&self, ticker: &str, year: i32, month: u32) -> Option<&DividendEvent> {
        self.get(ticker)
            .iter()
            .filter(|d| d.declared_date.year() == year && d.declared_date.month() == month)
            .min_by_key(|d| d.declared_date)
    }
}

/// Joins positions with externally supplied quotes and dividends.
///
/// Every ratio with a zero denominator, and every value depending on a
/// missed lookup, is `None` rather than zero.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// `(quote / unit_price − 1) × 100`, `None` when the unit price is zero.
    pub fn gain_loss_pct(quote: f64, unit_price: f64) -> Option<f64> {
        if unit_price == 0.0 {
            return None;
        }
        Some((quote / unit_price - 1.0) * 100.0)
    }

    /// `numerator / denominator × 100`, `None` when the denominator is zero.
    pub fn pct_of(numerator: f64, denominator: f64) -> Option<f64> {
        if denominator == 0.0 {
            return None;
        }
        Some(numerator / denominator * 100.0)
    }

    /// Value a single ledger row with an optional quote.
    pub fn value_entry(&self, entry: &LedgerEntry, quote: Option<f64>) -> ValuedPosition {
        let PositionState {
            adjusted_quantity,
            adjusted_cost,
            adjusted_unit_price,
        } = entry.position();

        ValuedPosition {
            ticker: entry.ticker.clone(),
            broker: entry.broker.clone(),
            exchange: entry.exchange.clone(),
            adjusted_quantity,
            adjusted_cost,
            adjusted_unit_price,
            current_quote: quote,
            current_value: quote.map(|q| q * adjusted_quantity),
            gain_loss_pct: quote.and_then(|q| Self::gain_loss_pct(q, adjusted_unit_price)),
        }
    }

    /// Current position of every held ticker. Liquidated tickers are dropped.
    pub fn current_positions<Q: QuoteLookup + ?Sized>(
        &self,
        ledgers: &[InstrumentLedger],
        quotes: &Q,
    ) -> Vec<ValuedPosition> {
        ledgers
            .iter()
            .filter_map(|ledger| ledger.last())
            .filter(|last| last.adjusted_quantity != 0.0)
            .map(|last| {
                let quote = quotes.quote(&last.ticker, last.exchange.as_deref(), None);
                if quote.is_none() {
                    warn!("No current quote for {}; value left undefined", last.ticker);
                }
                self.value_entry(last, quote)
            })
            .collect()
    }

    /// Daily position of a ticker valued at each close.
    ///
    /// Ledger rows (last of each day) and price points are merged by date and
    /// forward-filled; days before both a position and a close are known are dropped.
    pub fn historical_positions(&self, ledger: &InstrumentLedger, series: &[PricePoint]) -> Vec<HistoricalPosition> {
        let mut merged: BTreeMap<NaiveDate, (Option<PositionState>, Option<f64>)> = BTreeMap::new();
        for entry in &ledger.entries {
            merged.entry(entry.date).or_default().0 = Some(entry.position());
        }
        for point in series {
            merged.entry(point.date).or_default().1 = Some(point.price);
        }

        let mut rows = Vec::new();
        let mut position: Option<PositionState> = None;
        let mut close: Option<f64> = None;

        for (date, (day_position, day_close)) in merged {
            position = day_position.or(position);
            close = day_close.or(close);

            if let (Some(p), Some(c)) = (position, close) {
                rows.push(HistoricalPosition {
                    date,
                    ticker: ledger.ticker.clone(),
                    adjusted_quantity: p.adjusted_quantity,
                    adjusted_cost: p.adjusted_cost,
                    adjusted_unit_price: p.adjusted_unit_price,
                    close: c,
                    position_value: p.adjusted_quantity * c,
                });
            }
        }

        rows
    }

    /// Dividends declared in each month joined with that month-end's position.
    ///
    /// Months without a declared dividend are dropped. Rows are ordered by
    /// date (ascending or descending), then ticker.
    pub fn monthly_dividends<Q: QuoteLookup + ?Sized>(
        &self,
        positions: &[MonthlyPosition],
        dividends: &DividendBook,
        quotes: &Q,
        sort_date_ascending: bool,
    ) -> Vec<MonthlyDividend> {
        let mut rows: Vec<MonthlyDividend> = positions
            .iter()
            .filter_map(|pos| {
                let dividend = dividends.declared_in(&pos.ticker, pos.year, pos.month)?;
                let current_quote = quotes.quote(&pos.ticker, pos.exchange.as_deref(), None);

                Some(MonthlyDividend {
                    date: pos.date,
                    ticker: pos.ticker.clone(),
                    year: pos.year,
                    month: pos.month,
                    adjusted_quantity: pos.adjusted_quantity,
                    adjusted_cost: pos.adjusted_cost,
                    adjusted_unit_price: pos.adjusted_unit_price,
                    dividend_per_unit: dividend.amount_per_unit,
                    pay_date: dividend.pay_date,
                    amount_received: dividend.amount_per_unit * pos.adjusted_quantity,
                    current_quote,
                    yield_on_cost: Self::pct_of(dividend.amount_per_unit, pos.adjusted_unit_price),
                    dividend_yield: current_quote
                        .and_then(|q| Self::pct_of(dividend.amount_per_unit, q)),
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            let by_date = if sort_date_ascending {
                a.date.cmp(&b.date)
            } else {
                b.date.cmp(&a.date)
            };
            by_date.then_with(|| a.ticker.cmp(&b.ticker))
        });
        rows
    }

    /// Dividend events paid on the units held at each event date.
    ///
    /// Only events on or after the ticker's first transaction are considered;
    /// events that find no units held are dropped.
    pub fn dividend_payments(&self, ledgers: &[InstrumentLedger], dividends: &DividendBook) -> Vec<DividendPayment> {
        let mut rows = Vec::new();

        for ledger in ledgers {
            let Some(first) = ledger.first() else { continue };

            for event in dividends.get(&ledger.ticker) {
                if event.declared_date < first.date {
                    continue;
                }
                let units = match ledger.entry_at(event.declared_date) {
                    Some(entry) if entry.adjusted_quantity != 0.0 => entry.adjusted_quantity,
                    _ => continue,
                };
                rows.push(DividendPayment {
                    date: event.declared_date,
                    ticker: ledger.ticker.clone(),
                    units,
                    amount_per_unit: event.amount_per_unit,
                    amount_received: units * event.amount_per_unit,
                });
            }
        }

        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        rows
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}
