use async_trait::async_trait;
use crate::{
    AnalysisError, Constituent, ConstituentChange, FeatureRow, FundamentalsRow, ListedStock,
    PricePoint, PriceRange, ReportingPeriod, ScoredRow,
};

/// A swappable stock-picking strategy.
///
/// Implementations must be pure functions of their input: the evaluation
/// engine relies on identical inputs producing identical rankings.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Feature engineering over one (year, period) snapshot of fundamentals.
    fn preprocess(&self, snapshot: &[FundamentalsRow]) -> Result<Vec<FeatureRow>, AnalysisError>;

    /// Rank preprocessed rows by descending desirability. May return fewer
    /// rows than it was given.
    fn predict(&self, features: &[FeatureRow]) -> Result<Vec<ScoredRow>, AnalysisError>;
}

/// Per-company key metrics provider.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn key_metrics(
        &self,
        ticker: &str,
        period: ReportingPeriod,
        limit: usize,
    ) -> Result<Vec<FundamentalsRow>, AnalysisError>;
}

/// Current index membership with sector classification.
#[async_trait]
pub trait ConstituentSource: Send + Sync {
    async fn constituents(&self) -> Result<Vec<Constituent>, AnalysisError>;

    /// Historical additions to and removals from the index, newest first.
    async fn constituent_changes(&self) -> Result<Vec<ConstituentChange>, AnalysisError>;

    async fn stock_list(&self) -> Result<Vec<ListedStock>, AnalysisError>;
}

/// Daily close history provider.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn closes(
        &self,
        tickers: &[String],
        range: PriceRange,
    ) -> Result<Vec<PricePoint>, AnalysisError>;
}
