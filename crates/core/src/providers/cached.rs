use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use log::debug;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::asset::AssetClass;
use crate::models::dividend::DividendEvent;
use crate::models::price::{cache_key, PricePoint, ResponseCache};
use super::traits::{DividendProvider, QuoteProvider};

/// Shared handle to a response cache, so several decorators (and the
/// code persisting it) can use the same one.
pub type SharedCache = Arc<Mutex<ResponseCache>>;

pub fn shared_cache(cache: ResponseCache) -> SharedCache {
    Arc::new(Mutex::new(cache))
}

fn with_cache<R>(cache: &SharedCache, f: impl FnOnce(&mut ResponseCache) -> R) -> R {
    let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}

/// Wraps a quote provider with a time-expiring response cache.
///
/// Fresh entries are served without calling the inner provider; only
/// successful responses are stored. The lock is never held across an await.
pub struct CachedQuoteProvider {
    inner: Box<dyn QuoteProvider>,
    name: String,
    cache: SharedCache,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CachedQuoteProvider {
    pub fn new(inner: Box<dyn QuoteProvider>, cache: SharedCache, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let name = format!("{} (cached)", inner.name());
        Self {
            inner,
            name,
            cache,
            ttl,
            clock,
        }
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl QuoteProvider for CachedQuoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        self.inner.supported_asset_classes()
    }

    async fn get_price(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> Result<f64, CoreError> {
        let key = cache_key(ticker, exchange, as_of, as_of);
        let now = self.clock.now();

        if let Some(price) = with_cache(&self.cache, |c| c.get_price(&key, now, self.ttl)) {
            debug!("Cache hit for price {key}");
            return Ok(price);
        }

        let price = self.inner.get_price(ticker, exchange, as_of).await?;
        with_cache(&self.cache, |c| c.set_price(key, price, now));
        Ok(price)
    }

    async fn get_price_series(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let key = cache_key(ticker, exchange, Some(from), Some(to));
        let now = self.clock.now();

        if let Some(points) = with_cache(&self.cache, |c| c.get_series(&key, now, self.ttl)) {
            debug!("Cache hit for series {key}");
            return Ok(points);
        }

        let points = self.inner.get_price_series(ticker, exchange, from, to).await?;
        with_cache(&self.cache, |c| c.set_series(key, points.clone(), now));
        Ok(points)
    }
}

/// Wraps a dividend provider with a time-expiring response cache.
pub struct CachedDividendProvider {
    inner: Box<dyn DividendProvider>,
    name: String,
    cache: SharedCache,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CachedDividendProvider {
    pub fn new(
        inner: Box<dyn DividendProvider>,
        cache: SharedCache,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = format!("{} (cached)", inner.name());
        Self {
            inner,
            name,
            cache,
            ttl,
            clock,
        }
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl DividendProvider for CachedDividendProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        self.inner.supported_asset_classes()
    }

    async fn get_dividends(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        start: NaiveDate,
    ) -> Result<Vec<DividendEvent>, CoreError> {
        let key = cache_key(ticker, exchange, Some(start), None);
        let now = self.clock.now();

        if let Some(events) = with_cache(&self.cache, |c| c.get_dividends(&key, now, self.ttl)) {
            debug!("Cache hit for dividends {key}");
            return Ok(events);
        }

        let events = self.inner.get_dividends(ticker, exchange, start).await?;
        with_cache(&self.cache, |c| c.set_dividends(key, events.clone(), now));
        Ok(events)
    }
}
