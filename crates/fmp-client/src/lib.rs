//! Client for the Financial Modeling Prep v3 REST API: key metrics, index
//! constituents, the global stock list and daily close history.

mod models;
mod rate_limit;

pub use models::{key_metric_record_to_row, key_metrics_to_rows, STRUCTURAL_FIELDS};

use analysis_core::{
    AnalysisError, Constituent, ConstituentChange, ConstituentSource, FundamentalsRow,
    FundamentalsSource, ListedStock, PricePoint, PriceRange, PriceSource, ReportingPeriod,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

use models::{ChangeEntry, ConstituentEntry, HistoricalPriceResponse, StockListEntry};
use rate_limit::RateLimiter;

const BASE_URL: &str = "https://financialmodelingprep.com";

/// Requests per minute on the Starter plan; free tier users should lower it.
pub const DEFAULT_RATE_LIMIT: usize = 300;

#[derive(Clone)]
pub struct FmpClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl FmpClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Point the client at a different host (mirror or local stub).
    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            rate_limiter: RateLimiter::new(DEFAULT_RATE_LIMIT, Duration::from_secs(60)),
        }
    }

    /// Override the default requests-per-minute budget.
    pub fn with_rate_limit(mut self, per_minute: usize) -> Self {
        self.rate_limiter = RateLimiter::new(per_minute, Duration::from_secs(60));
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AnalysisError> {
        let request = builder
            .build()
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!(
                "FMP 429 rate limited, waiting {}s before retry {}/3",
                wait_secs,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError(
            "Rate limited by FMP after 3 retries".to_string(),
        ))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AnalysisError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .send_request(
                self.client
                    .get(&url)
                    .query(query)
                    .query(&[("apikey", &self.api_key)]),
            )
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AnalysisError::ApiError(format!("{}: {}", path, e)))
    }

    /// Key metrics of one company, newest first.
    pub async fn key_metrics(
        &self,
        ticker: &str,
        period: ReportingPeriod,
        limit: usize,
    ) -> Result<Vec<FundamentalsRow>, AnalysisError> {
        let records: Vec<Map<String, Value>> = self
            .get_json(
                &format!("/api/v3/key-metrics/{}", ticker),
                &[
                    ("period", period.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let rows = key_metrics_to_rows(ticker, &records);
        tracing::debug!("{}: {} key-metric rows ({})", ticker, rows.len(), period);
        Ok(rows)
    }

    pub async fn sp500_constituents(&self) -> Result<Vec<Constituent>, AnalysisError> {
        let entries: Vec<ConstituentEntry> =
            self.get_json("/api/v3/sp500_constituent", &[]).await?;
        Ok(entries.into_iter().map(Constituent::from).collect())
    }

    /// Historical additions to and removals from the S&P 500.
    pub async fn sp500_changes(&self) -> Result<Vec<ConstituentChange>, AnalysisError> {
        let entries: Vec<ChangeEntry> = self
            .get_json("/api/v3/historical/sp500_constituent", &[])
            .await?;
        Ok(models::changes_to_records(entries))
    }

    pub async fn stock_list(&self) -> Result<Vec<ListedStock>, AnalysisError> {
        let entries: Vec<StockListEntry> = self.get_json("/api/v3/stock/list", &[]).await?;
        Ok(entries.into_iter().map(ListedStock::from).collect())
    }

    /// Daily closes of one ticker. Unknown tickers yield an empty history.
    pub async fn historical_closes(
        &self,
        ticker: &str,
        range: PriceRange,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        let query = match range {
            PriceRange::Max => Vec::new(),
            PriceRange::Between(from, to) => vec![
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
            ],
        };
        let response: HistoricalPriceResponse = self
            .get_json(
                &format!("/api/v3/historical-price-full/{}", ticker),
                &query,
            )
            .await?;

        Ok(models::historical_to_points(ticker, response))
    }

    /// Daily closes of every ticker, one request at a time. A failing ticker
    /// is retried once after the first pass; the ones still failing are
    /// returned next to the points with their error.
    pub async fn closes_with_failures(
        &self,
        tickers: &[String],
        range: PriceRange,
    ) -> (Vec<PricePoint>, Vec<(String, String)>) {
        let mut points = Vec::new();
        let mut retry = Vec::new();
        for (i, ticker) in tickers.iter().enumerate() {
            match self.historical_closes(ticker, range).await {
                Ok(mut history) => points.append(&mut history),
                Err(e) => {
                    tracing::debug!("Closes for {} failed, will retry: {}", ticker, e);
                    retry.push(ticker);
                }
            }
            if (i + 1) % 50 == 0 {
                tracing::info!("Fetched closes for {}/{} tickers", i + 1, tickers.len());
            }
        }

        let mut failed = Vec::new();
        for ticker in retry {
            match self.historical_closes(ticker, range).await {
                Ok(mut history) => points.append(&mut history),
                Err(e) => failed.push((ticker.clone(), e.to_string())),
            }
        }

        if !failed.is_empty() {
            tracing::warn!(
                "Closes unavailable for {} of {} tickers: {:?}",
                failed.len(),
                tickers.len(),
                failed.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>()
            );
        }
        (points, failed)
    }
}

#[async_trait]
impl FundamentalsSource for FmpClient {
    async fn key_metrics(
        &self,
        ticker: &str,
        period: ReportingPeriod,
        limit: usize,
    ) -> Result<Vec<FundamentalsRow>, AnalysisError> {
        FmpClient::key_metrics(self, ticker, period, limit).await
    }
}

#[async_trait]
impl ConstituentSource for FmpClient {
    async fn constituents(&self) -> Result<Vec<Constituent>, AnalysisError> {
        self.sp500_constituents().await
    }

    async fn constituent_changes(&self) -> Result<Vec<ConstituentChange>, AnalysisError> {
        self.sp500_changes().await
    }

    async fn stock_list(&self) -> Result<Vec<ListedStock>, AnalysisError> {
        FmpClient::stock_list(self).await
    }
}

#[async_trait]
impl PriceSource for FmpClient {
    /// All-or-nothing: any ticker still failing after its retry fails the
    /// call, so a partial history is never handed to a cache.
    async fn closes(
        &self,
        tickers: &[String],
        range: PriceRange,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        let (points, failed) = self.closes_with_failures(tickers, range).await;
        if failed.is_empty() {
            return Ok(points);
        }
        Err(AnalysisError::DataUnavailable(format!(
            "price fetch failed for {} of {} tickers: {}",
            failed.len(),
            tickers.len(),
            failed
                .iter()
                .map(|(t, _)| t.as_str())
                .collect::<Vec<_>>()
                .join(",")
        )))
    }
}
