use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::models::dividend::{DividendTotal, IncomeRecord, MonthlyDividend, Period, PeriodKey};
use crate::models::position::{InvestmentTotals, MonthlyPosition, MonthlyTotal, ValuedPosition};

/// Dimension used to split portfolio totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Broker,
    Exchange,
}

/// Sums positions and income into portfolio-level figures.
///
/// Rows with a missing derived value are left out of the sums that
/// need it, never counted as zero.
pub struct AggregationService;

impl AggregationService {
    pub fn new() -> Self {
        Self
    }

    /// Total invested and current value over current positions.
    pub fn total_invest(&self, positions: &[ValuedPosition]) -> InvestmentTotals {
        let mut totals = InvestmentTotals::default();
        for pos in positions {
            totals.invested += pos.adjusted_cost;
            match pos.current_value {
                Some(value) => {
                    totals.current_value += value;
                    totals.priced_invested += pos.adjusted_cost;
                }
                None => totals.unpriced.push(pos.ticker.clone()),
            }
        }
        totals
    }

    /// Totals split by broker or exchange. Positions without the
    /// attribute are grouped under `None`.
    pub fn total_invest_by(
        &self,
        positions: &[ValuedPosition],
        group_by: GroupBy,
    ) -> BTreeMap<Option<String>, InvestmentTotals> {
        let mut groups: BTreeMap<Option<String>, Vec<ValuedPosition>> = BTreeMap::new();
        for pos in positions {
            let key = match group_by {
                GroupBy::Broker => pos.broker.clone(),
                GroupBy::Exchange => pos.exchange.clone(),
            };
            groups.entry(key).or_default().push(pos.clone());
        }

        groups
            .into_iter()
            .map(|(key, group)| (key, self.total_invest(&group)))
            .collect()
    }

    /// `(current / invested − 1) × 100` over priced positions.
    pub fn total_return(&self, positions: &[ValuedPosition]) -> Option<f64> {
        self.total_invest(positions).return_pct()
    }

    /// Cost basis summed across tickers at each month-end, oldest first.
    pub fn total_invest_monthly(&self, positions: &[MonthlyPosition]) -> Vec<MonthlyTotal> {
        let mut by_month: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for pos in positions {
            *by_month.entry(pos.date).or_insert(0.0) += pos.adjusted_cost;
        }
        by_month
            .into_iter()
            .map(|(date, adjusted_cost)| MonthlyTotal { date, adjusted_cost })
            .collect()
    }

    /// Income summed per (period, ticker), ordered by period then ticker.
    pub fn dividends_received<R: IncomeRecord>(&self, records: &[R], period: Period) -> Vec<DividendTotal> {
        let mut totals: BTreeMap<(PeriodKey, String), f64> = BTreeMap::new();
        for record in records {
            let key = (PeriodKey::of(period, record.income_date()), record.ticker().to_string());
            *totals.entry(key).or_insert(0.0) += record.amount_received();
        }
        totals
            .into_iter()
            .map(|((period, ticker), amount_received)| DividendTotal {
                period,
                ticker,
                amount_received,
            })
            .collect()
    }

    /// Dividend yield of the portfolio at current prices.
    ///
    /// Uses each ticker's most recent dividend month: income received over the
    /// market value of the units it was paid on, × 100. Tickers without a
    /// current quote are skipped; `None` when no market value remains.
    pub fn total_dividend_yield(&self, dividends: &[MonthlyDividend]) -> Option<f64> {
        let mut latest: HashMap<&str, &MonthlyDividend> = HashMap::new();
        for row in dividends {
            latest
                .entry(row.ticker.as_str())
                .and_modify(|current| {
                    if row.date > current.date {
                        *current = row;
                    }
                })
                .or_insert(row);
        }

        let (income, market_value) = latest
            .values()
            .filter_map(|row| {
                row.current_quote
                    .map(|q| (row.amount_received, q * row.adjusted_quantity))
            })
            .fold((0.0, 0.0), |(i, v), (ri, rv)| (i + ri, v + rv));

        if market_value == 0.0 {
            return None;
        }
        Some(income / market_value * 100.0)
    }
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new()
    }
}
