use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use log::debug;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::errors::CoreError;
use crate::models::asset::AssetClass;
use crate::models::price::PricePoint;
use super::traits::QuoteProvider;

const BASE_URL: &str = "https://dados.cvm.gov.br/dados/FI/DOC/INF_DIARIO/DADOS";
const PROVIDER: &str = "CVM";

const CNPJ_COLUMN: &str = "CNPJ_FUNDO";
const DATE_COLUMN: &str = "DT_COMPTC";
const QUOTA_COLUMN: &str = "VL_QUOTA";

/// CVM open-data provider for Brazilian mutual fund quota values.
///
/// - **Free**: No API key.
/// - **Source**: monthly daily-report files `inf_diario_fi_YYYYMM.csv`,
///   one row per fund and business day.
/// - Funds are identified by CNPJ; the transaction file's ticker holds it.
///
/// Files are Latin-1 encoded. Only the ASCII columns needed here are decoded.
pub struct CvmProvider {
    client: Client,
    base_url: String,
    clock: Arc<dyn Clock>,
}

impl CvmProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the provider at another host (mirrors, local test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock that decides "today" for undated quotes.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Name of the daily-report file covering `year`/`month`.
    pub fn report_file(year: i32, month: u32) -> String {
        format!("inf_diario_fi_{year}{month:02}.csv")
    }

    /// Quota values of the fund `cnpj` in a daily-report file, oldest first.
    ///
    /// CNPJs are compared on their digits, so `97.929.213/0001-34` and
    /// `97929213000134` match. Rows with an unreadable date or value are skipped.
    pub fn parse_quotes(body: &[u8], cnpj: &str) -> Result<Vec<PricePoint>, CoreError> {
        let wanted = cnpj_digits(cnpj.as_bytes());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(body);

        let headers = reader.byte_headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name.as_bytes())
                .ok_or_else(|| CoreError::Api {
                    provider: PROVIDER.into(),
                    message: format!("Daily report has no '{name}' column"),
                })
        };
        let (cnpj_col, date_col, quota_col) = (column(CNPJ_COLUMN)?, column(DATE_COLUMN)?, column(QUOTA_COLUMN)?);

        let mut points = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            if record.get(cnpj_col).map(cnpj_digits).as_deref() != Some(wanted.as_str()) {
                continue;
            }
            let date = record
                .get(date_col)
                .and_then(|raw| std::str::from_utf8(raw).ok())
                .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());
            let price = record
                .get(quota_col)
                .and_then(|raw| std::str::from_utf8(raw).ok())
                .and_then(|raw| raw.trim().parse::<f64>().ok());
            if let (Some(date), Some(price)) = (date, price) {
                points.push(PricePoint { date, price });
            }
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    /// Quota values of one month. A report not published yet counts as empty.
    async fn month_quotes(&self, cnpj: &str, year: i32, month: u32) -> Result<Vec<PricePoint>, CoreError> {
        let url = format!("{}/{}", self.base_url, Self::report_file(year, month));
        debug!("Getting fund report: {url}");

        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Fund report {url} not published");
            return Ok(Vec::new());
        }
        let body = resp.error_for_status()?.bytes().await?;
        Self::parse_quotes(&body, cnpj)
    }
}

impl Default for CvmProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn cnpj_digits(raw: &[u8]) -> String {
    raw.iter().filter(|b| b.is_ascii_digit()).map(|&b| b as char).collect()
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

#[async_trait]
impl QuoteProvider for CvmProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_classes(&self) -> Vec<AssetClass> {
        vec![AssetClass::MutualFund]
    }

    /// Last quota value on or before `as_of` (today when undated). Falls back
    /// to the previous month's report when the month has no value yet.
    async fn get_price(
        &self,
        ticker: &str,
        _exchange: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> Result<f64, CoreError> {
        let date = as_of.unwrap_or_else(|| self.clock.today());
        let mut month = (date.year(), date.month());

        for _ in 0..2 {
            let quotes = self.month_quotes(ticker, month.0, month.1).await?;
            if let Some(point) = quotes.iter().rev().find(|p| p.date <= date) {
                return Ok(point.price);
            }
            month = previous_month(month.0, month.1);
        }

        Err(CoreError::PriceNotAvailable {
            ticker: ticker.to_string(),
            date: date.to_string(),
        })
    }

    async fn get_price_series(
        &self,
        ticker: &str,
        _exchange: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let mut points = Vec::new();
        let mut month = (from.year(), from.month());
        let last = (to.year(), to.month());

        while month <= last {
            points.extend(
                self.month_quotes(ticker, month.0, month.1)
                    .await?
                    .into_iter()
                    .filter(|p| p.date >= from && p.date <= to),
            );
            month = if month.1 >= 12 { (month.0 + 1, 1) } else { (month.0, month.1 + 1) };
        }

        if points.is_empty() {
            return Err(CoreError::PriceNotAvailable {
                ticker: ticker.to_string(),
                date: to.to_string(),
            });
        }
        Ok(points)
    }
}
