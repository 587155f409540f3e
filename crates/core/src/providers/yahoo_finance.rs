use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use log::debug;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::clock::{Clock, SystemClock};
use crate::errors::CoreError;
use crate::models::asset::{provider_symbol, AssetClass};
use crate::models::dividend::DividendEvent;
use crate::models::price::PricePoint;
use super::traits::{DividendProvider, QuoteProvider};

const PROVIDER: &str = "Yahoo Finance";

/// How far back a dated quote may look for the last trading day.
const LOOKBACK_DAYS: i64 = 7;

/// Yahoo Finance provider for stock and real-estate fund quotes and stock dividends.
///
/// - **Free**: No API key required.
/// - **Coverage**: Global equities, B3 listings via the `.SA` suffix.
/// - **Data**: Latest quotes, daily history, dividend events.
///
/// Dividend events carry Yahoo's event date as the declared date and no pay date.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
    clock: Arc<dyn Clock>,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self {
            connector,
            clock: Arc::new(SystemClock),
        })
    }

    /// Clock that ends open-ended requests (undated quotes, dividend history).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Last day covered by open-ended requests.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Convert a `chrono::NaiveDate` to `time::OffsetDateTime` (midnight UTC).
    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let month = u8::try_from(date.month())
            .ok()
            .and_then(|m| time::Month::try_from(m).ok())
            .ok_or_else(|| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Invalid month in {date}"),
            })?;

        let odt = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Invalid date {date}: {e}"),
            })?
            .midnight()
            .assume_utc();
        Ok(odt)
    }

    /// Convert a unix timestamp (seconds) to `chrono::NaiveDate`.
    fn timestamp_to_naive_date(ts: i64) -> Option<NaiveDate> {
        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
    }

    fn api_error(message: String) -> CoreError {
        CoreError::Api {
            provider: PROVIDER.into(),
            message,
        }
    }

    /// Daily closes for `symbol` in `[from, to]`.
    async fn closes(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<PricePoint>, CoreError> {
        let start = Self::to_offset_datetime(from)?;
        let end = Self::to_offset_datetime(to + Duration::days(1))?; // inclusive end

        let resp = self
            .connector
            .get_quote_history(symbol, start, end)
            .await
            .map_err(|e| Self::api_error(format!("Failed to fetch history for {symbol}: {e}")))?;

        let quotes = resp
            .quotes()
            .map_err(|e| Self::api_error(format!("Failed to parse quotes for {symbol}: {e}")))?;

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = Self::timestamp_to_naive_date(q.timestamp as i64)?;
                (date >= from && date <= to).then_some(PricePoint { date, price: q.close })
            })
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    /// Last close on or before `date`, looking back up to a week.
    async fn close_on(&self, ticker: &str, symbol: &str, date: NaiveDate) -> Result<f64, CoreError> {
        let points = self
            .closes(symbol, date - Duration::days(LOOKBACK_DAYS), date)
            .await?;
        points
            .last()
            .map(|p| p.price)
            .ok_or_else(|| CoreError::PriceNotAvailable {
                ticker: ticker.to_string(),
                date: date.to_string(),
            })
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        vec![AssetClass::Stock, AssetClass::RealEstateFund]
    }

    async fn get_price(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> Result<f64, CoreError> {
        let symbol = provider_symbol(ticker, exchange);
        debug!("Getting price for {symbol} ({as_of:?})");

        if let Some(date) = as_of {
            return self.close_on(ticker, &symbol, date).await;
        }

        let latest = match self.connector.get_latest_quotes(&symbol, "1d").await {
            Ok(resp) => resp.last_quote().map(|q| q.close).ok(),
            Err(e) => {
                debug!("Latest quote for {symbol} failed ({e}); trying the last week");
                None
            }
        };

        match latest {
            Some(price) => Ok(price),
            None => {
                let today = self.today();
                self.close_on(ticker, &symbol, today).await
            }
        }
    }

    async fn get_price_series(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let symbol = provider_symbol(ticker, exchange);
        debug!("Getting prices for {symbol} from {from} to {to}");
        self.closes(&symbol, from, to).await
    }
}

#[async_trait]
impl DividendProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        vec![AssetClass::Stock]
    }

    async fn get_dividends(
        &self,
        ticker: &str,
        exchange: Option<&str>,
        start: NaiveDate,
    ) -> Result<Vec<DividendEvent>, CoreError> {
        let symbol = provider_symbol(ticker, exchange);
        debug!("Getting dividends for {symbol} since {start}");

        let today = self.today();
        let resp = self
            .connector
            .get_quote_history(
                &symbol,
                Self::to_offset_datetime(start)?,
                Self::to_offset_datetime(today + Duration::days(1))?,
            )
            .await
            .map_err(|e| Self::api_error(format!("Failed to fetch dividends for {symbol}: {e}")))?;

        let dividends = resp.dividends().map_err(|_| CoreError::DividendsNotAvailable {
            ticker: ticker.to_string(),
        })?;

        let mut events: Vec<DividendEvent> = dividends
            .iter()
            .filter_map(|d| {
                let declared_date = Self::timestamp_to_naive_date(d.date as i64)?;
                (declared_date >= start).then_some(DividendEvent {
                    declared_date,
                    pay_date: None,
                    amount_per_unit: d.amount,
                })
            })
            .collect();
        events.sort_by_key(|e| e.declared_date);
        Ok(events)
    }
}
