use std::sync::Arc;

use analysis_core::{
    AnalysisError, Constituent, ConstituentChange, ConstituentSource, FundamentalsRow,
    FundamentalsSource, ListedStock, PricePoint, PriceRange, PriceSource, ReportingPeriod,
};
use async_trait::async_trait;
use fmp_client::FmpClient;

use crate::config::LoaderConfig;

/// Everything the loader fetches on a cache miss.
pub trait Provider: FundamentalsSource + ConstituentSource + PriceSource {}

impl<T: FundamentalsSource + ConstituentSource + PriceSource> Provider for T {}

/// Stand-in used when no API key is configured: cached files still load,
/// any fetch fails with `DataUnavailable`.
pub struct OfflineProvider;

fn offline(what: &str) -> AnalysisError {
    AnalysisError::DataUnavailable(format!(
        "{} is not cached and API_KEY is not set",
        what
    ))
}

#[async_trait]
impl FundamentalsSource for OfflineProvider {
    async fn key_metrics(
        &self,
        ticker: &str,
        _period: ReportingPeriod,
        _limit: usize,
    ) -> Result<Vec<FundamentalsRow>, AnalysisError> {
        Err(offline(&format!("key metrics for {}", ticker)))
    }
}

#[async_trait]
impl ConstituentSource for OfflineProvider {
    async fn constituents(&self) -> Result<Vec<Constituent>, AnalysisError> {
        Err(offline("constituent list"))
    }

    async fn constituent_changes(&self) -> Result<Vec<ConstituentChange>, AnalysisError> {
        Err(offline("constituent change history"))
    }

    async fn stock_list(&self) -> Result<Vec<ListedStock>, AnalysisError> {
        Err(offline("stock list"))
    }
}

#[async_trait]
impl PriceSource for OfflineProvider {
    async fn closes(
        &self,
        _tickers: &[String],
        _range: PriceRange,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        Err(offline("price history"))
    }
}

pub fn provider_from_config(config: &LoaderConfig) -> Arc<dyn Provider> {
    match config.require_api_key() {
        Ok(key) => {
            Arc::new(FmpClient::new(key.to_string()).with_rate_limit(config.fmp_rate_limit))
        }
        Err(e) => {
            tracing::warn!("{}; running from cached artifacts only", e);
            Arc::new(OfflineProvider)
        }
    }
}
