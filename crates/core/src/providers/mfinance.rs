use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::asset::AssetClass;
use crate::models::dividend::DividendEvent;
use super::traits::DividendProvider;

const BASE_URL: &str = "https://mfinance.com.br/api/v1/fiis/dividends";
const PROVIDER: &str = "mfinance";

/// mfinance API provider for Brazilian real-estate fund (FII) dividends.
///
/// - **Free**: No API key.
/// - **Endpoint**: `/fiis/dividends/{ticker}` returns the full declaration history.
/// - Each entry has a declared date, a pay date and the value per quota.
pub struct MFinanceProvider {
    client: Client,
    base_url: String,
}

impl MFinanceProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the provider at another host (mirrors, local test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Parse an mfinance response body, keeping dividends declared on or after `start`.
    pub fn parse_dividends(body: &str, ticker: &str, start: NaiveDate) -> Result<Vec<DividendEvent>, CoreError> {
        let resp: DividendsResponse = serde_json::from_str(body).map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse dividends for {ticker}: {e}"),
        })?;

        let mut events: Vec<DividendEvent> = resp
            .dividends
            .into_iter()
            .filter_map(|d| {
                let declared_date = parse_api_date(&d.declared_date)?;
                Some(DividendEvent {
                    declared_date,
                    pay_date: d.pay_date.as_deref().and_then(parse_api_date),
                    amount_per_unit: d.value,
                })
            })
            .filter(|e| e.declared_date >= start)
            .collect();
        events.sort_by_key(|e| e.declared_date);
        Ok(events)
    }
}

impl Default for MFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── mfinance API response types ─────────────────────────────────────

#[derive(Deserialize)]
struct DividendsResponse {
    #[serde(default)]
    dividends: Vec<DividendEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DividendEntry {
    declared_date: String,
    #[serde(default)]
    pay_date: Option<String>,
    value: f64,
}

/// Dates come as `2020-03-31T00:00:00`; only the day matters.
fn parse_api_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[async_trait]
impl DividendProvider for MFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        vec![AssetClass::RealEstateFund]
    }

    async fn get_dividends(
        &self,
        ticker: &str,
        _exchange: Option<&str>,
        start: NaiveDate,
    ) -> Result<Vec<DividendEvent>, CoreError> {
        let ticker = ticker.to_uppercase();
        let url = format!("{}/{ticker}", self.base_url);
        debug!("Getting dividends: {url}");

        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CoreError::DividendsNotAvailable { ticker });
        }
        let body = resp.error_for_status()?.text().await?;

        Self::parse_dividends(&body, &ticker, start)
    }
}
