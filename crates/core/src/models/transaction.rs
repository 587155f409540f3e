use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Kind of a recorded operation.
///
/// Ordering matters: same-day operations on a ticker are accounted
/// buys first, then sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    Buy,
    Sell,
}

impl OperationKind {
    /// Parse an operation label as written in transaction files.
    ///
    /// Accepts the Portuguese labels used by the brokers' exports
    /// (`Compra`, `Venda`) and the English ones, case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "compra" | "buy" => Some(OperationKind::Buy),
            "venda" | "sell" => Some(OperationKind::Sell),
            _ => None,
        }
    }

    /// Apply this operation's sign to a quantity magnitude.
    /// Sells always yield a non-positive delta, whatever sign the file used.
    pub fn signed_quantity(&self, quantity: f64) -> f64 {
        match self {
            OperationKind::Buy => quantity,
            OperationKind::Sell => -quantity.abs(),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Buy => write!(f, "Buy"),
            OperationKind::Sell => write!(f, "Sell"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            CoreError::ValidationError(format!("Unknown operation kind '{}'", s.trim()))
        })
    }
}

/// One buy or sell of an instrument, as recorded in the transaction file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Trade date (daily granularity)
    pub date: NaiveDate,

    /// Instrument ticker, uppercased
    pub ticker: String,

    /// Buy or Sell
    pub operation: OperationKind,

    /// Quantity delta: positive for buys, negative for sells
    pub quantity: f64,

    /// Price paid/received per unit
    pub unit_price: f64,

    /// Broker the operation went through, if recorded
    #[serde(default)]
    pub broker: Option<String>,

    /// Exchange the instrument trades on (e.g. "B3"), if recorded
    #[serde(default)]
    pub exchange: Option<String>,

    /// Position of the record in its source file. Breaks same-day ties.
    #[serde(default)]
    pub sequence: usize,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        ticker: impl Into<String>,
        operation: OperationKind,
        quantity: f64,
        unit_price: f64,
    ) -> Self {
        Self {
            date,
            ticker: ticker.into().trim().to_uppercase(),
            operation,
            quantity: operation.signed_quantity(quantity),
            unit_price,
            broker: None,
            exchange: None,
            sequence: 0,
        }
    }

    pub fn buy(date: NaiveDate, ticker: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self::new(date, ticker, OperationKind::Buy, quantity, unit_price)
    }

    pub fn sell(date: NaiveDate, ticker: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self::new(date, ticker, OperationKind::Sell, quantity, unit_price)
    }

    pub fn with_broker(mut self, broker: impl Into<String>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_sequence(mut self, sequence: usize) -> Self {
        self.sequence = sequence;
        self
    }

    /// Signed cost of this operation (negative for sells).
    pub fn operation_cost(&self) -> f64 {
        self.quantity * self.unit_price
    }
}
