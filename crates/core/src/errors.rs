use thiserror::Error;

/// Unified error type for the entire portfolio-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
///
/// Ratios with a zero denominator are not errors: they surface as `None`
/// in the derived row types.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transaction files ───────────────────────────────────────────
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("CSV error: {0}")]
    Csv(String),

    // ── Cache file ──────────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── File I/O (native only) ──────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No provider available for asset class: {0}")]
    NoProvider(String),

    // ── Lookup misses ───────────────────────────────────────────────
    #[error("Price not available for {ticker} on {date}")]
    PriceNotAvailable { ticker: String, date: String },

    #[error("Dividends not available for {ticker}")]
    DividendsNotAvailable { ticker: String },

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl CoreError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        CoreError::Parse {
            line,
            message: message.into(),
        }
    }

    /// True for errors that mean "the provider has no data for this key".
    /// Callers recover these locally as missing values.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            CoreError::PriceNotAvailable { .. } | CoreError::DividendsNotAvailable { .. }
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        match e.position() {
            Some(pos) => CoreError::Parse {
                line: pos.line() as usize,
                message: e.to_string(),
            },
            None => CoreError::Csv(e.to_string()),
        }
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors often carry the full URL; drop the query string.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
