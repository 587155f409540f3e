use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::schema::{Cell, Field, TableRow};
use super::transaction::{OperationKind, Transaction};

/// A transaction annotated with the running position after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub ticker: String,
    pub operation: OperationKind,
    /// Signed quantity delta (sells are negative)
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub broker: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub sequence: usize,

    /// `quantity × unit_price`, signed
    pub operation_cost: f64,
    /// Units held after this operation
    pub adjusted_quantity: f64,
    /// Cost basis of the units held, since the last full liquidation
    pub adjusted_cost: f64,
    /// `adjusted_cost / adjusted_quantity`, 0 when nothing is held
    pub adjusted_unit_price: f64,
}

impl LedgerEntry {
    /// The snapshot of this entry's running position.
    pub fn position(&self) -> PositionState {
        PositionState {
            adjusted_quantity: self.adjusted_quantity,
            adjusted_cost: self.adjusted_cost,
            adjusted_unit_price: self.adjusted_unit_price,
        }
    }

    pub(crate) fn from_transaction(tx: &Transaction, position: PositionState) -> Self {
        Self {
            date: tx.date,
            ticker: tx.ticker.clone(),
            operation: tx.operation,
            quantity: tx.quantity,
            unit_price: tx.unit_price,
            broker: tx.broker.clone(),
            exchange: tx.exchange.clone(),
            sequence: tx.sequence,
            operation_cost: tx.operation_cost(),
            adjusted_quantity: position.adjusted_quantity,
            adjusted_cost: position.adjusted_cost,
            adjusted_unit_price: position.adjusted_unit_price,
        }
    }
}

/// Running position of a single instrument at some point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionState {
    pub adjusted_quantity: f64,
    pub adjusted_cost: f64,
    pub adjusted_unit_price: f64,
}

impl PositionState {
    pub fn is_liquidated(&self) -> bool {
        self.adjusted_quantity == 0.0
    }
}

/// All ledger entries of one ticker, in accounting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentLedger {
    pub ticker: String,
    pub entries: Vec<LedgerEntry>,
}

impl InstrumentLedger {
    pub fn first(&self) -> Option<&LedgerEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    /// Exchange recorded on the first transaction, used for quote lookups.
    pub fn exchange(&self) -> Option<&str> {
        self.entries.iter().find_map(|e| e.exchange.as_deref())
    }

    /// The last entry dated on or before `date`.
    pub fn entry_at(&self, date: NaiveDate) -> Option<&LedgerEntry> {
        let idx = self.entries.partition_point(|e| e.date <= date);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    /// True when the ticker has been fully sold.
    pub fn is_liquidated(&self) -> bool {
        self.last().map_or(true, |e| e.adjusted_quantity == 0.0)
    }
}

impl TableRow for LedgerEntry {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::plain("Date"),
            Field::plain("Ticker"),
            Field::plain("Operation"),
            Field::plain("Quantity"),
            Field::currency("Unit Price"),
            Field::currency("Operation Cost"),
            Field::plain("Adj Qtd"),
            Field::currency("Adj Cost"),
            Field::currency("Adj unit price"),
        ];
        FIELDS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.date.into(),
            self.ticker.as_str().into(),
            Cell::Text(self.operation.to_string()),
            self.quantity.into(),
            self.unit_price.into(),
            self.operation_cost.into(),
            self.adjusted_quantity.into(),
            self.adjusted_cost.into(),
            self.adjusted_unit_price.into(),
        ]
    }
}
