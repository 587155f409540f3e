use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use std::io::Read;

use crate::errors::CoreError;
use crate::models::settings::LoaderSettings;
use crate::models::transaction::{OperationKind, Transaction};

const COL_DATE: &str = "date";
const COL_TICKER: &str = "ticker";
const COL_OPERATION: &str = "operation";
const COL_QUANTITY: &str = "quantity";
const COL_UNIT_PRICE: &str = "unit price";
const COL_BROKER: &str = "broker";
const EXCHANGE_COLUMNS: [&str; 2] = ["stock exchange", "exchange"];

/// Fallback accepted when a date doesn't match the configured format.
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads delimited transaction files into `Transaction` records.
///
/// Required columns: `Date;Ticker;Operation;Quantity;Unit Price`.
/// `Broker` and `Stock Exchange` (or `Exchange`) are optional and passed through.
/// Any malformed row aborts the whole load.
pub struct LoaderService {
    settings: LoaderSettings,
}

/// Column positions resolved from the header row.
struct Columns {
    date: usize,
    ticker: usize,
    operation: usize,
    quantity: usize,
    unit_price: usize,
    broker: Option<usize>,
    exchange: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, CoreError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| CoreError::parse(1, format!("Missing required column '{name}'")))
        };

        Ok(Self {
            date: required(COL_DATE)?,
            ticker: required(COL_TICKER)?,
            operation: required(COL_OPERATION)?,
            quantity: required(COL_QUANTITY)?,
            unit_price: required(COL_UNIT_PRICE)?,
            broker: find(COL_BROKER),
            exchange: EXCHANGE_COLUMNS.iter().find_map(|c| find(c)),
        })
    }
}

impl LoaderService {
    pub fn new(settings: LoaderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Parse transactions from in-memory file content.
    pub fn load_from_str(&self, content: &str) -> Result<Vec<Transaction>, CoreError> {
        self.load_from_reader(content.trim_start().as_bytes())
    }

    /// Parse transactions from a file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(&self, path: &str) -> Result<Vec<Transaction>, CoreError> {
        debug!("Loading transactions from {path}");
        let content = std::fs::read_to_string(path)?;
        self.load_from_str(&content)
    }

    /// Parse transactions from any reader.
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<Vec<Transaction>, CoreError> {
        let delimiter = u8::try_from(self.settings.delimiter).map_err(|_| {
            CoreError::ValidationError(format!(
                "Delimiter '{}' must be a single-byte character",
                self.settings.delimiter
            ))
        })?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns = Columns::resolve(&headers)?;

        let mut transactions = Vec::new();
        for (sequence, result) in reader.records().enumerate() {
            let record = result?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(sequence + 2);
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            transactions.push(self.parse_record(&record, &columns, line, sequence)?);
        }

        debug!("Loaded {} transactions", transactions.len());
        Ok(transactions)
    }

    fn parse_record(
        &self,
        record: &StringRecord,
        columns: &Columns,
        line: usize,
        sequence: usize,
    ) -> Result<Transaction, CoreError> {
        let field = |idx: usize, name: &str| {
            record
                .get(idx)
                .ok_or_else(|| CoreError::parse(line, format!("Missing value for '{name}'")))
        };
        let optional = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let date = self.parse_date(field(columns.date, "Date")?, line)?;

        let ticker = field(columns.ticker, "Ticker")?.to_uppercase();
        if ticker.is_empty() {
            return Err(CoreError::parse(line, "Empty ticker"));
        }

        let raw_operation = field(columns.operation, "Operation")?;
        let operation = OperationKind::parse(raw_operation)
            .ok_or_else(|| CoreError::parse(line, format!("Unknown operation '{raw_operation}'")))?;

        let quantity = self.parse_decimal(field(columns.quantity, "Quantity")?, "Quantity", line)?;
        let unit_price =
            self.parse_decimal(field(columns.unit_price, "Unit Price")?, "Unit Price", line)?;

        Ok(Transaction {
            date,
            ticker,
            operation,
            quantity: operation.signed_quantity(quantity),
            unit_price,
            broker: optional(columns.broker),
            exchange: optional(columns.exchange),
            sequence,
        })
    }

    fn parse_date(&self, raw: &str, line: usize) -> Result<NaiveDate, CoreError> {
        NaiveDate::parse_from_str(raw, &self.settings.date_format)
            .or_else(|_| NaiveDate::parse_from_str(raw, ISO_DATE_FORMAT))
            .map_err(|e| CoreError::parse(line, format!("Invalid date '{raw}': {e}")))
    }

    fn parse_decimal(&self, raw: &str, name: &str, line: usize) -> Result<f64, CoreError> {
        parse_number(raw, self.settings.decimal_separator, self.settings.thousands_separator)
            .ok_or_else(|| CoreError::parse(line, format!("Invalid {name} '{raw}'")))
    }
}

impl Default for LoaderService {
    fn default() -> Self {
        Self::new(LoaderSettings::default())
    }
}

/// Parse a locale-formatted number (`1.234,56` with `,` decimal and `.` thousands).
///
/// Returns `None` for empty, non-numeric or non-finite input.
pub fn parse_number(raw: &str, decimal_separator: char, thousands_separator: Option<char>) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized: String = trimmed
        .chars()
        .filter(|c| Some(*c) != thousands_separator || *c == decimal_separator)
        .map(|c| if c == decimal_separator { '.' } else { c })
        .collect();

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
