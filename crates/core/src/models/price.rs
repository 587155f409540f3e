use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::dividend::DividendEvent;

/// A single price data point (date → close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Cache key: provider request parameters flattened to a string,
/// e.g. `"HGLG11|B3|2020-03-10|2021-01-01"`.
pub type ResponseCacheKey = String;

/// Build the cache key for a provider request.
pub fn cache_key(ticker: &str, exchange: Option<&str>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> ResponseCacheKey {
    let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    format!(
        "{}|{}|{}|{}",
        ticker.to_uppercase(),
        exchange.unwrap_or("-").to_uppercase(),
        fmt(from),
        fmt(to)
    )
}

/// A provider response and the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse<T> {
    pub fetched_at: NaiveDateTime,
    pub payload: T,
}

impl<T> CachedResponse<T> {
    pub fn is_fresh(&self, now: NaiveDateTime, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Local cache of provider responses with time-based expiry.
///
/// Entries are never served once older than the TTL the reader asks for;
/// expired entries stay until overwritten or pruned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseCache {
    /// Single prices: key (range = as-of date or "-" for latest) → price
    pub prices: HashMap<ResponseCacheKey, CachedResponse<f64>>,

    /// Price series: key (range = from..to) → points sorted by date
    pub series: HashMap<ResponseCacheKey, CachedResponse<Vec<PricePoint>>>,

    /// Dividend histories: key (range = start date) → events
    pub dividends: HashMap<ResponseCacheKey, CachedResponse<Vec<DividendEvent>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_price(&self, key: &str, now: NaiveDateTime, ttl: Duration) -> Option<f64> {
        self.prices
            .get(key)
            .filter(|c| c.is_fresh(now, ttl))
            .map(|c| c.payload)
    }

    pub fn set_price(&mut self, key: ResponseCacheKey, price: f64, now: NaiveDateTime) {
        self.prices.insert(key, CachedResponse { fetched_at: now, payload: price });
    }

    pub fn get_series(&self, key: &str, now: NaiveDateTime, ttl: Duration) -> Option<Vec<PricePoint>> {
        self.series
            .get(key)
            .filter(|c| c.is_fresh(now, ttl))
            .map(|c| c.payload.clone())
    }

    /// Store a price series, sorted by date.
    pub fn set_series(&mut self, key: ResponseCacheKey, mut points: Vec<PricePoint>, now: NaiveDateTime) {
        points.sort_by_key(|p| p.date);
        self.series.insert(key, CachedResponse { fetched_at: now, payload: points });
    }

    pub fn get_dividends(&self, key: &str, now: NaiveDateTime, ttl: Duration) -> Option<Vec<DividendEvent>> {
        self.dividends
            .get(key)
            .filter(|c| c.is_fresh(now, ttl))
            .map(|c| c.payload.clone())
    }

    pub fn set_dividends(&mut self, key: ResponseCacheKey, events: Vec<DividendEvent>, now: NaiveDateTime) {
        self.dividends.insert(key, CachedResponse { fetched_at: now, payload: events });
    }

    /// Total number of cached responses.
    pub fn total_entries(&self) -> usize {
        self.prices.len() + self.series.len() + self.dividends.len()
    }

    /// Drop every response fetched `ttl` or longer before `now`.
    /// Returns the number of entries removed.
    pub fn prune_expired(&mut self, now: NaiveDateTime, ttl: Duration) -> usize {
        let before = self.total_entries();
        self.prices.retain(|_, c| c.is_fresh(now, ttl));
        self.series.retain(|_, c| c.is_fresh(now, ttl));
        self.dividends.retain(|_, c| c.is_fresh(now, ttl));
        before - self.total_entries()
    }

    pub fn clear(&mut self) {
        self.prices.clear();
        self.series.clear();
        self.dividends.clear();
    }
}
