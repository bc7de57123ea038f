use std::collections::BTreeMap;

use analysis_core::{AnalysisError, FeatureRow, FundamentalsRow, ScoredRow, Strategy};

use crate::{rank_descending, validate_features, validate_snapshot};

/// Ranks a snapshot by a single key metric.
#[derive(Debug, Clone)]
pub struct MetricRankStrategy {
    name: String,
    metric: String,
    higher_is_better: bool,
}

impl MetricRankStrategy {
    pub fn new(metric: impl Into<String>, higher_is_better: bool) -> Self {
        let metric = metric.into();
        let direction = if higher_is_better { "desc" } else { "asc" };
        Self {
            name: format!("metric_rank:{}:{}", metric, direction),
            metric,
            higher_is_better,
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }
}

impl Strategy for MetricRankStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn preprocess(&self, snapshot: &[FundamentalsRow]) -> Result<Vec<FeatureRow>, AnalysisError> {
        validate_snapshot(snapshot)?;

        Ok(snapshot
            .iter()
            .filter_map(|row| {
                row.metric(&self.metric).map(|value| {
                    let mut features = BTreeMap::new();
                    features.insert(self.metric.clone(), value);
                    FeatureRow {
                        symbol: row.symbol.clone(),
                        features,
                    }
                })
            })
            .collect())
    }

    fn predict(&self, features: &[FeatureRow]) -> Result<Vec<ScoredRow>, AnalysisError> {
        validate_features(features)?;

        let scored = features
            .iter()
            .map(|row| {
                let value = row.features.get(&self.metric).copied().ok_or_else(|| {
                    AnalysisError::PredictError(format!(
                        "feature '{}' missing for {}",
                        self.metric, row.symbol
                    ))
                })?;
                let score = if self.higher_is_better { value } else { -value };
                Ok(ScoredRow {
                    symbol: row.symbol.clone(),
                    score,
                })
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        Ok(rank_descending(scored))
    }
}
