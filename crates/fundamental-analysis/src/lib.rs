//! Fundamentals-driven stock-picking strategies.
//!
//! Every strategy here implements [`analysis_core::Strategy`] and ranks one
//! (year, period) snapshot of key metrics.

pub mod cross_section;
pub mod metric_rank;
pub mod value_composite;

use std::collections::HashSet;

use analysis_core::{AnalysisError, FeatureRow, FundamentalsRow, ScoredRow, Strategy};

pub use metric_rank::MetricRankStrategy;
pub use value_composite::{Factor, ValueCompositeStrategy};

/// Build a strategy from a short name: `value`, or `metric:<column>[:asc|:desc]`.
pub fn strategy_from_name(name: &str) -> Result<Box<dyn Strategy>, AnalysisError> {
    let parts: Vec<&str> = name.trim().split(':').collect();
    match parts.as_slice() {
        ["value"] | ["value_composite"] => Ok(Box::new(ValueCompositeStrategy::default())),
        ["metric", metric] if !metric.is_empty() => {
            Ok(Box::new(MetricRankStrategy::new(*metric, true)))
        }
        ["metric", metric, direction] if !metric.is_empty() => match *direction {
            "asc" => Ok(Box::new(MetricRankStrategy::new(*metric, false))),
            "desc" => Ok(Box::new(MetricRankStrategy::new(*metric, true))),
            other => Err(AnalysisError::InvalidData(format!(
                "unknown sort direction '{}'",
                other
            ))),
        },
        _ => Err(AnalysisError::InvalidData(format!(
            "unknown strategy '{}'",
            name
        ))),
    }
}

/// Reject snapshots that cannot be ranked: empty symbols or a symbol
/// reported twice for the same fiscal date.
pub(crate) fn validate_snapshot(snapshot: &[FundamentalsRow]) -> Result<(), AnalysisError> {
    let mut seen = HashSet::new();
    for row in snapshot {
        if row.symbol.trim().is_empty() {
            return Err(AnalysisError::PreprocessError(format!(
                "row dated {} has an empty symbol",
                row.date
            )));
        }
        if !seen.insert((row.symbol.as_str(), row.date, row.period)) {
            return Err(AnalysisError::PreprocessError(format!(
                "duplicate row for {} {} {}",
                row.symbol, row.date, row.period
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_features(features: &[FeatureRow]) -> Result<(), AnalysisError> {
    match features.iter().find(|f| f.symbol.trim().is_empty()) {
        Some(_) => Err(AnalysisError::PredictError(
            "feature row has an empty symbol".to_string(),
        )),
        None => Ok(()),
    }
}

/// Sort by descending score; ties fall back to ascending symbol so the
/// ranking is reproducible.
pub(crate) fn rank_descending(mut rows: Vec<ScoredRow>) -> Vec<ScoredRow> {
    rows.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    rows
}
