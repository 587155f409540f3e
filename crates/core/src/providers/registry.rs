use chrono::{Duration, NaiveDate};
use log::warn;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};

use crate::errors::CoreError;
use crate::models::asset::AssetClass;
use crate::models::dividend::DividendEvent;
use crate::models::price::PricePoint;

#[cfg(not(target_arch = "wasm32"))]
use super::cvm::CvmProvider;
#[cfg(not(target_arch = "wasm32"))]
use super::mfinance::MFinanceProvider;
use super::cached::{CachedDividendProvider, CachedQuoteProvider, SharedCache};
use super::traits::{DividendProvider, QuoteProvider};
#[cfg(not(target_arch = "wasm32"))]
use super::yahoo_finance::YahooFinanceProvider;

/// Registry of quote and dividend providers.
///
/// Routes requests by `AssetClass`. Providers are tried in registration
/// order; when one fails the next is used as a fallback.
pub struct ProviderRegistry {
    quote_providers: Vec<Box<dyn QuoteProvider>>,
    dividend_providers: Vec<Box<dyn DividendProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            quote_providers: Vec::new(),
            dividend_providers: Vec::new(),
        }
    }

    /// Create a registry with the bundled providers on the system clock.
    pub fn new_with_defaults() -> Self {
        Self::with_default_providers(Arc::new(SystemClock))
    }

    /// Create a registry with the bundled providers.
    ///
    /// Yahoo Finance prices stocks and real-estate funds and reports stock
    /// dividends; mfinance reports real-estate fund dividends; CVM daily
    /// reports price mutual funds. `clock` ends open-ended requests.
    #[cfg_attr(target_arch = "wasm32", allow(unused_variables))]
    pub fn with_default_providers(clock: Arc<dyn Clock>) -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(not(target_arch = "wasm32"))]
        {
            match YahooFinanceProvider::new() {
                Ok(yahoo) => {
                    registry.register_quotes(Box::new(yahoo.with_clock(Arc::clone(&clock))));
                    if let Ok(yahoo) = YahooFinanceProvider::new() {
                        registry.register_dividends(Box::new(yahoo.with_clock(Arc::clone(&clock))));
                    }
                }
                Err(e) => warn!("Yahoo Finance provider unavailable: {e}"),
            }
            registry.register_quotes(Box::new(CvmProvider::new().with_clock(clock)));
            registry.register_dividends(Box::new(MFinanceProvider::new()));
        }

        registry
    }

    /// Wrap every registered provider with the shared response cache.
    pub fn into_cached(
        self,
        cache: SharedCache,
        quote_ttl: Duration,
        dividend_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quote_providers = self
            .quote_providers
            .into_iter()
            .map(|p| {
                Box::new(CachedQuoteProvider::new(p, Arc::clone(&cache), quote_ttl, Arc::clone(&clock)))
                    as Box<dyn QuoteProvider>
            })
            .collect();
        let dividend_providers = self
            .dividend_providers
            .into_iter()
            .map(|p| {
                Box::new(CachedDividendProvider::new(
                    p,
                    Arc::clone(&cache),
                    dividend_ttl,
                    Arc::clone(&clock),
                )) as Box<dyn DividendProvider>
            })
            .collect();
        Self {
            quote_providers,
            dividend_providers,
        }
    }

    pub fn register_quotes(&mut self, provider: Box<dyn QuoteProvider>) {
        self.quote_providers.push(provider);
    }

    pub fn register_dividends(&mut self, provider: Box<dyn DividendProvider>) {
        self.dividend_providers.push(provider);
    }

    /// All quote providers for an asset class, in priority order.
    pub fn quote_providers_for(&self, asset_class: AssetClass) -> Vec<&dyn QuoteProvider> {
        self.quote_providers
            .iter()
            .filter(|p| p.supported_asset_classes().contains(&asset_class))
            .map(|p| p.as_ref())
            .collect()
    }

    /// All dividend providers for an asset class, in priority order.
    pub fn dividend_providers_for(&self, asset_class: AssetClass) -> Vec<&dyn DividendProvider> {
        self.dividend_providers
            .iter()
            .filter(|p| p.supported_asset_classes().contains(&asset_class))
            .map(|p| p.as_ref())
            .collect()
    }

    pub fn has_quote_provider_for(&self, asset_class: AssetClass) -> bool {
        !self.quote_providers_for(asset_class).is_empty()
    }

    pub fn provider_names(&self, asset_class: AssetClass) -> Vec<String> {
        self.quote_providers_for(asset_class)
            .iter()
            .map(|p| p.name().to_string())
            .chain(
                self.dividend_providers_for(asset_class)
                    .iter()
                    .map(|p| p.name().to_string()),
            )
            .collect()
    }

    /// Price from the first provider that answers, with fallback.
    /// Rejects non-finite and negative prices.
    pub async fn get_price(
        &self,
        asset_class: AssetClass,
        ticker: &str,
        exchange: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> Result<f64, CoreError> {
        let providers = self.quote_providers_for(asset_class);
        if providers.is_empty() {
            return Err(CoreError::NoProvider(asset_class.to_string()));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.get_price(ticker, exchange, as_of).await {
                Ok(price) if price.is_finite() && price >= 0.0 => return Ok(price),
                Ok(price) => {
                    last_error = Some(CoreError::Api {
                        provider: provider.name().to_string(),
                        message: format!(
                            "Invalid price returned for {ticker}: {price} (must be finite and non-negative)"
                        ),
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(asset_class.to_string())))
    }

    /// Price series from the first provider that answers, with fallback.
    pub async fn get_price_series(
        &self,
        asset_class: AssetClass,
        ticker: &str,
        exchange: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let providers = self.quote_providers_for(asset_class);
        if providers.is_empty() {
            return Err(CoreError::NoProvider(asset_class.to_string()));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.get_price_series(ticker, exchange, from, to).await {
                Ok(points) => return Ok(points),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(asset_class.to_string())))
    }

    /// Dividend history from the first provider that answers, with fallback.
    pub async fn get_dividends(
        &self,
        asset_class: AssetClass,
        ticker: &str,
        exchange: Option<&str>,
        start: NaiveDate,
    ) -> Result<Vec<DividendEvent>, CoreError> {
        let providers = self.dividend_providers_for(asset_class);
        if providers.is_empty() {
            return Err(CoreError::NoProvider(asset_class.to_string()));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.get_dividends(ticker, exchange, start).await {
                Ok(events) => return Ok(events),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(asset_class.to_string())))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
