use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::schema::{Cell, Field, TableRow};

/// A dividend declared by an instrument, as reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub declared_date: NaiveDate,
    /// Not every source reports a payment date
    #[serde(default)]
    pub pay_date: Option<NaiveDate>,
    pub amount_per_unit: f64,
}

/// Dividend declared in a month joined with that month-end's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyDividend {
    /// Month-end of the declaration month
    pub date: NaiveDate,
    pub ticker: String,
    pub year: i32,
    pub month: u32,
    pub adjusted_quantity: f64,
    pub adjusted_cost: f64,
    pub adjusted_unit_price: f64,
    pub dividend_per_unit: f64,
    pub pay_date: Option<NaiveDate>,
    /// `dividend_per_unit × adjusted_quantity`
    pub amount_received: f64,
    pub current_quote: Option<f64>,
    /// Dividend over the average price paid, × 100
    pub yield_on_cost: Option<f64>,
    /// Dividend over the current quote, × 100
    pub dividend_yield: Option<f64>,
}

impl TableRow for MonthlyDividend {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::plain("Date"),
            Field::plain("Ticker"),
            Field::plain("Adj Qtd"),
            Field::currency("Adj Cost"),
            Field::currency("Adj unit price"),
            Field::currency("Monthly Dividends"),
            Field::plain("Pay Date"),
            Field::currency("Amount Received"),
            Field::currency("Current Quote"),
            Field::percentage("Dividend Yield on Cost"),
            Field::percentage("Dividend Yield"),
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
            self.dividend_per_unit.into(),
            self.pay_date.map_or(Cell::Missing, Cell::Date),
            self.amount_received.into(),
            self.current_quote.into(),
            self.yield_on_cost.into(),
            self.dividend_yield.into(),
        ]
    }
}

/// A dividend event paid on the units held at its date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendPayment {
    pub date: NaiveDate,
    pub ticker: String,
    pub units: f64,
    pub amount_per_unit: f64,
    /// `units × amount_per_unit`
    pub amount_received: f64,
}

impl TableRow for DividendPayment {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::plain("date"),
            Field::plain("Ticker"),
            Field::plain("Units"),
            Field::currency("value"),
            Field::currency("Dividends"),
        ];
        FIELDS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.date.into(),
            self.ticker.as_str().into(),
            self.units.into(),
            self.amount_per_unit.into(),
            self.amount_received.into(),
        ]
    }
}

/// Anything that represents money received from a ticker on a date.
pub trait IncomeRecord {
    fn income_date(&self) -> NaiveDate;
    fn ticker(&self) -> &str;
    fn amount_received(&self) -> f64;
}

impl IncomeRecord for MonthlyDividend {
    fn income_date(&self) -> NaiveDate {
        self.date
    }

    fn ticker(&self) -> &str {
        &self.ticker
    }

    fn amount_received(&self) -> f64 {
        self.amount_received
    }
}

impl IncomeRecord for DividendPayment {
    fn income_date(&self) -> NaiveDate {
        self.date
    }

    fn ticker(&self) -> &str {
        &self.ticker
    }

    fn amount_received(&self) -> f64 {
        self.amount_received
    }
}

/// Bucket used when summing income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Year,
    Month,
}

/// Key of an income bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodKey {
    Year(i32),
    Month { year: i32, month: u32 },
}

impl PeriodKey {
    pub fn of(period: Period, date: NaiveDate) -> Self {
        match period {
            Period::Year => PeriodKey::Year(date.year()),
            Period::Month => PeriodKey::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodKey::Year(y) => write!(f, "{y}"),
            PeriodKey::Month { year, month } => write!(f, "{year}-{month:02}"),
        }
    }
}

/// Total income of one ticker in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendTotal {
    pub period: PeriodKey,
    pub ticker: String,
    pub amount_received: f64,
}

impl TableRow for DividendTotal {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::plain("Period"),
            Field::plain("Ticker"),
            Field::currency("Amount Received"),
        ];
        FIELDS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.period.to_string()),
            self.ticker.as_str().into(),
            self.amount_received.into(),
        ]
    }
}
