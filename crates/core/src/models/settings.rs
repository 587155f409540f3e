use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::CoreError;

use super::asset::AssetClass;

/// How transaction files are laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Field delimiter (`;` in broker exports)
    pub delimiter: char,
    /// Decimal separator of numeric fields
    pub decimal_separator: char,
    /// Thousands separator of numeric fields, stripped before parsing
    pub thousands_separator: Option<char>,
    /// chrono format of the `Date` column (day-first by default)
    pub date_format: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            thousands_separator: Some('.'),
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

/// Provider response cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Lifetime of cached quotes and price series
    pub quote_ttl_days: i64,
    /// Lifetime of cached equity dividend histories
    pub stock_dividend_ttl_days: i64,
    /// Lifetime of cached real-estate fund dividend histories
    pub fund_dividend_ttl_days: i64,
    /// Where the cache is persisted between runs (`None` keeps it in memory)
    pub path: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            quote_ttl_days: 1,
            stock_dividend_ttl_days: 7,
            fund_dividend_ttl_days: 15,
            path: None,
        }
    }
}

impl CacheSettings {
    pub fn quote_ttl(&self) -> Duration {
        Duration::days(self.quote_ttl_days)
    }

    /// Dividend cache lifetime for an asset class.
    pub fn dividend_ttl(&self, asset_class: AssetClass) -> Duration {
        match asset_class {
            AssetClass::RealEstateFund => Duration::days(self.fund_dividend_ttl_days),
            AssetClass::Stock | AssetClass::MutualFund => {
                Duration::days(self.stock_dividend_ttl_days)
            }
        }
    }
}

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub loader: LoaderSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Transaction file per asset class. Missing classes fall back to
    /// `AssetClass::default_file`.
    #[serde(default)]
    pub transaction_files: HashMap<AssetClass, String>,
}

impl Settings {
    /// Defaults, with transaction file paths taken from the environment
    /// (`STOCKS_TRANSACTIONS`, `FII_TRANSACTIONS`, `FUNDS_TRANSACTIONS`) when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        for class in [AssetClass::Stock, AssetClass::RealEstateFund, AssetClass::MutualFund] {
            if let Ok(path) = std::env::var(class.env_var()) {
                if !path.trim().is_empty() {
                    settings.transaction_files.insert(class, path);
                }
            }
        }
        settings
    }

    /// Parse a JSON settings document. Omitted sections keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Transaction file for an asset class.
    pub fn transaction_file(&self, asset_class: AssetClass) -> &str {
        self.transaction_files
            .get(&asset_class)
            .map(String::as_str)
            .unwrap_or_else(|| asset_class.default_file())
    }
}
