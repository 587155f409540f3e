use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a derived column should be displayed.
///
/// Attached to each column where it is computed, so the presentation layer
/// never has to guess from a column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldFormat {
    /// Monetary amount, rendered with the locale's currency symbol
    Currency,
    /// Percentage, rendered with two decimals and a `%` suffix
    Percentage,
    /// Anything else (text, dates, quantities, counters)
    Plain,
}

/// A named column of a derived table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub format: FieldFormat,
}

impl Field {
    pub const fn currency(name: &'static str) -> Self {
        Self { name, format: FieldFormat::Currency }
    }

    pub const fn percentage(name: &'static str) -> Self {
        Self { name, format: FieldFormat::Percentage }
    }

    pub const fn plain(name: &'static str) -> Self {
        Self { name, format: FieldFormat::Plain }
    }
}

/// A single value of a derived table row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    /// Value could not be derived (lookup miss, zero denominator)
    Missing,
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Cell::Missing, Cell::Number)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Cell::Date(d)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<Option<&str>> for Cell {
    fn from(s: Option<&str>) -> Self {
        s.map_or(Cell::Missing, |s| Cell::Text(s.to_string()))
    }
}

/// Implemented by every derived row type so it can be rendered generically.
pub trait TableRow {
    /// Column descriptors, in display order.
    fn fields() -> &'static [Field];

    /// Values for this row, same order and length as `fields()`.
    fn cells(&self) -> Vec<Cell>;
}

/// Number formatting conventions used when rendering cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberLocale {
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    pub currency_symbol: String,
}

impl Default for NumberLocale {
    /// Brazilian real: `R$ 1.234,56`
    fn default() -> Self {
        Self {
            decimal_separator: ',',
            thousands_separator: Some('.'),
            currency_symbol: "R$".to_string(),
        }
    }
}

impl NumberLocale {
    /// Format `value` with `decimals` fractional digits and this locale's separators.
    pub fn format_number(&self, value: f64, decimals: usize) -> String {
        let raw = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match raw.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (raw.as_str(), None),
        };

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                if let Some(sep) = self.thousands_separator {
                    grouped.push(sep);
                }
            }
            grouped.push(ch);
        }

        let mut out = String::new();
        if value < 0.0 && raw.chars().any(|c| c.is_ascii_digit() && c != '0') {
            out.push('-');
        }
        out.push_str(&grouped);
        if let Some(frac) = frac_part {
            out.push(self.decimal_separator);
            out.push_str(frac);
        }
        out
    }
}

impl FieldFormat {
    /// Render a cell for display. Missing values render as an empty string.
    pub fn render(&self, cell: &Cell, locale: &NumberLocale) -> String {
        match (self, cell) {
            (_, Cell::Missing) => String::new(),
            (FieldFormat::Currency, Cell::Number(v)) => {
                format!("{} {}", locale.currency_symbol, locale.format_number(*v, 2))
            }
            (FieldFormat::Percentage, Cell::Number(v)) => {
                format!("{}%", locale.format_number(*v, 2))
            }
            (_, Cell::Number(v)) => v.to_string(),
            (_, Cell::Integer(v)) => v.to_string(),
            (_, Cell::Text(s)) => s.clone(),
            (_, Cell::Date(d)) => d.format("%Y-%m-%d").to_string(),
        }
    }
}
