use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::asset::AssetClass;
use crate::models::dividend::DividendEvent;
use crate::models::price::PricePoint;

/// Source of market prices (Yahoo Finance, a cache, a test double).
///
/// Implementations report "no data" as `CoreError::PriceNotAvailable`;
/// the tracker treats that as a missing value for the one ticker.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Which asset classes this provider can price.
    fn supported_asset_classes(&self) -> Vec<AssetClass>;

    /// Close price on `as_of`, or the latest available when `None`.
    /// Non-trading days resolve to the last close before them.
    async fn get_price(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> Result<f64, CoreError>;

    /// Daily closes from `from` to `to` inclusive, sorted by date.
    async fn get_price_series(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;
}

/// Source of declared/paid dividends.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait DividendProvider: Send + Sync {
    fn name(&self) -> &str;

    fn supported_asset_classes(&self) -> Vec<AssetClass>;

    /// Dividends declared on or after `start`.
    async fn get_dividends(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        start: NaiveDate,
    ) -> Result<Vec<DividendEvent>, CoreError>;
}
