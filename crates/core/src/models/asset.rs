use serde::{Deserialize, Serialize};

/// The class of instrument a transaction file tracks.
/// Determines which price and dividend providers are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetClass {
    /// Listed equities (PETR4, AAPL, ...): Yahoo Finance quotes and dividends
    Stock,
    /// Listed real-estate funds (HGLG11, ...): Yahoo quotes, mfinance dividends
    RealEstateFund,
    /// Open-ended mutual funds keyed by CNPJ: CVM daily-report quotes
    MutualFund,
}

impl AssetClass {
    /// Environment variable that points at this class's transaction file.
    pub fn env_var(&self) -> &'static str {
        match self {
            AssetClass::Stock => "STOCKS_TRANSACTIONS",
            AssetClass::RealEstateFund => "FII_TRANSACTIONS",
            AssetClass::MutualFund => "FUNDS_TRANSACTIONS",
        }
    }

    /// Transaction file used when the environment variable is not set.
    pub fn default_file(&self) -> &'static str {
        match self {
            AssetClass::Stock => "example_transactions/stocks_transactions.csv",
            AssetClass::RealEstateFund => "example_transactions/fii_transactions.csv",
            AssetClass::MutualFund => "example_transactions/funds_transactions.csv",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Stock => write!(f, "Stock"),
            AssetClass::RealEstateFund => write!(f, "RealEstateFund"),
            AssetClass::MutualFund => write!(f, "MutualFund"),
        }
    }
}

/// Exchange code that needs Yahoo's `.SA` suffix.
pub const B3_EXCHANGE: &str = "B3";

/// Build the symbol a market-data provider expects for a ticker.
///
/// Tickers listed on B3 are suffixed with `.SA`; everything else passes through.
pub fn provider_symbol(ticker: &str, exchange: Option<&str>) -> String {
    match exchange {
        Some(ex) if ex.trim().eq_ignore_ascii_case(B3_EXCHANGE) => format!("{ticker}.SA"),
        _ => ticker.to_string(),
    }
}
