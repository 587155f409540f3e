use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::schema::{Cell, Field, TableRow};

/// Holdings of one ticker at a calendar month-end, carried forward from
/// the last transaction at or before that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPosition {
    /// Last day of the month
    pub date: NaiveDate,
    pub ticker: String,
    #[serde(default)]
    pub broker: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    pub adjusted_quantity: f64,
    pub adjusted_cost: f64,
    pub adjusted_unit_price: f64,
    pub year: i32,
    pub month: u32,
}

impl TableRow for MonthlyPosition {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::plain("Date"),
            Field::plain("Ticker"),
            Field::plain("Adj Qtd"),
            Field::currency("Adj Cost"),
            Field::currency("Adj unit price"),
            Field::plain("year"),
            Field::plain("month"),
        ];
        FIELDS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.date.into(),
            self.ticker.as_str().into(),
            self.adjusted_quantity.into(),
            self.adjusted_cost.into(),
            self.adjusted_unit_price.into(),
            Cell::Integer(i64::from(self.year)),
            Cell::Integer(i64::from(self.month)),
        ]
    }
}

/// A currently held position joined with a market quote.
///
/// Quote-derived fields are `None` when the quote lookup missed;
/// `gain_loss_pct` is also `None` when the unit cost is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedPosition {
    pub ticker: String,
    #[serde(default)]
    pub broker: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    pub adjusted_quantity: f64,
    pub adjusted_cost: f64,
    pub adjusted_unit_price: f64,
    pub current_quote: Option<f64>,
    pub current_value: Option<f64>,
    pub gain_loss_pct: Option<f64>,
}

impl TableRow for ValuedPosition {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::plain("Broker"),
            Field::plain("Stock Exchange"),
            Field::plain("Ticker"),
            Field::plain("Adj Qtd"),
            Field::currency("Adj Cost"),
            Field::currency("Adj unit price"),
            Field::currency("Current Quote"),
            Field::currency("Current Value"),
            Field::percentage("Gain/Loss Pct"),
        ];
        FIELDS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.broker.as_deref().into(),
            self.exchange.as_deref().into(),
            self.ticker.as_str().into(),
            self.adjusted_quantity.into(),
            self.adjusted_cost.into(),
            self.adjusted_unit_price.into(),
            self.current_quote.into(),
            self.current_value.into(),
            self.gain_loss_pct.into(),
        ]
    }
}

/// Daily position of a ticker valued at that day's close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPosition {
    pub date: NaiveDate,
    pub ticker: String,
    pub adjusted_quantity: f64,
    pub adjusted_cost: f64,
    pub adjusted_unit_price: f64,
    pub close: f64,
    /// `adjusted_quantity × close`
    pub position_value: f64,
}

impl TableRow for HistoricalPosition {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::plain("Date"),
            Field::plain("Ticker"),
            Field::plain("Adj Qtd"),
            Field::currency("Adj Cost"),
            Field::currency("Adj unit price"),
            Field::currency("Close"),
            Field::currency("Position updated"),
        ];
        FIELDS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.date.into(),
            self.ticker.as_str().into(),
            self.adjusted_quantity.into(),
            self.adjusted_cost.into(),
            self.adjusted_unit_price.into(),
            self.close.into(),
            self.position_value.into(),
        ]
    }
}

/// Portfolio-level totals over a set of current positions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvestmentTotals {
    /// Sum of `adjusted_cost` over every position
    pub invested: f64,
    /// Sum of `current_value` over positions that have a quote
    pub current_value: f64,
    /// Sum of `adjusted_cost` over positions that have a quote
    pub priced_invested: f64,
    /// Tickers left out of `current_value` because their quote was missing
    pub unpriced: Vec<String>,
}

impl InvestmentTotals {
    /// `(current_value / priced_invested − 1) × 100`, `None` when nothing priced was invested.
    pub fn return_pct(&self) -> Option<f64> {
        if self.priced_invested == 0.0 {
            return None;
        }
        Some((self.current_value / self.priced_invested - 1.0) * 100.0)
    }
}

/// Sum of cost basis across all tickers at one month-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub date: NaiveDate,
    pub adjusted_cost: f64,
}

impl TableRow for MonthlyTotal {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::plain("Date"), Field::currency("Adj Cost")];
        FIELDS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![self.date.into(), self.adjusted_cost.into()]
    }
}
