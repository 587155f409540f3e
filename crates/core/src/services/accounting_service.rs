use log::debug;

use crate::models::ledger::{InstrumentLedger, LedgerEntry, PositionState};
use crate::models::transaction::Transaction;

/// Running quantities closer to zero than this are treated as a full liquidation.
/// Keeps fractional units (fund quotas) from leaving a float residue that would
/// otherwise carry the old cost basis into the next position.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Turns raw transactions into per-ticker ledgers with running quantity,
/// average cost and unit price.
///
/// Cost basis is an average-cost method per liquidation epoch: the cost is a
/// running sum of signed operation costs that restarts whenever the position
/// returns to zero. Pure business logic, no I/O.
pub struct AccountingService;

/// Accumulator for one ticker's position while walking its transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningPosition {
    quantity: f64,
    cost: f64,
}

impl RunningPosition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transaction and return the position right after it.
    ///
    /// A row that brings the quantity to zero reports zero cost and zero unit
    /// price; the next row therefore starts a fresh cost basis.
    pub fn apply(&mut self, tx: &Transaction) -> PositionState {
        self.quantity += tx.quantity;
        if self.quantity.abs() < QUANTITY_EPSILON {
            self.quantity = 0.0;
            self.cost = 0.0;
        } else {
            self.cost += tx.operation_cost();
        }
        self.state()
    }

    pub fn state(&self) -> PositionState {
        PositionState {
            adjusted_quantity: self.quantity,
            adjusted_cost: self.cost,
            adjusted_unit_price: if self.quantity == 0.0 {
                0.0
            } else {
                self.cost / self.quantity
            },
        }
    }
}

impl AccountingService {
    pub fn new() -> Self {
        Self
    }

    /// Sort into accounting order: ticker, date, operation (buys first),
    /// then position in the source file.
    pub fn sort_transactions(transactions: &mut [Transaction]) {
        transactions.sort_by(|a, b| {
            a.ticker
                .cmp(&b.ticker)
                .then(a.date.cmp(&b.date))
                .then(a.operation.cmp(&b.operation))
                .then(a.sequence.cmp(&b.sequence))
        });
    }

    /// Build the annotated ledger of every transaction, ordered by ticker
    /// and then accounting order.
    pub fn build_entries(&self, transactions: &[Transaction]) -> Vec<LedgerEntry> {
        self.build_ledgers(transactions)
            .into_iter()
            .flat_map(|ledger| ledger.entries)
            .collect()
    }

    /// Build one ledger per ticker, sorted by ticker.
    pub fn build_ledgers(&self, transactions: &[Transaction]) -> Vec<InstrumentLedger> {
        let mut sorted = transactions.to_vec();
        Self::sort_transactions(&mut sorted);

        let mut ledgers: Vec<InstrumentLedger> = Vec::new();
        let mut running = RunningPosition::new();

        for tx in &sorted {
            let starts_new_ticker = ledgers.last().map_or(true, |l| l.ticker != tx.ticker);
            if starts_new_ticker {
                running = RunningPosition::new();
                ledgers.push(InstrumentLedger {
                    ticker: tx.ticker.clone(),
                    entries: Vec::new(),
                });
            }

            let position = running.apply(tx);
            if let Some(ledger) = ledgers.last_mut() {
                ledger.entries.push(LedgerEntry::from_transaction(tx, position));
            }
        }

        debug!(
            "Built {} ledgers from {} transactions",
            ledgers.len(),
            transactions.len()
        );
        ledgers
    }

    /// Ledger of a single ticker (case-insensitive), if it has any transaction.
    pub fn build_ledger(&self, transactions: &[Transaction], ticker: &str) -> Option<InstrumentLedger> {
        let upper = ticker.trim().to_uppercase();
        let filtered: Vec<Transaction> = transactions
            .iter()
            .filter(|t| t.ticker == upper)
            .cloned()
            .collect();
        self.build_ledgers(&filtered).into_iter().next()
    }
}

impl Default for AccountingService {
    fn default() -> Self {
        Self::new()
    }
}
