use std::collections::BTreeMap;

use analysis_core::{AnalysisError, FeatureRow, FundamentalsRow, ScoredRow, Strategy};
use serde::{Deserialize, Serialize};

use crate::cross_section::clipped_z_scores;
use crate::{rank_descending, validate_features, validate_snapshot};

/// One input of the composite: a key-metric column and its preferred direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub metric: String,
    pub higher_is_better: bool,
}

impl Factor {
    pub fn new(metric: &str, higher_is_better: bool) -> Self {
        Self {
            metric: metric.to_string(),
            higher_is_better,
        }
    }
}

/// Multi-factor value ranking: cheap (high earnings and free-cash-flow
/// yield), profitable (high ROE) and lightly levered (low debt/equity).
///
/// Each factor is z-scored across the snapshot, clipped, and sign-adjusted
/// so that a larger feature is always better; the score is their mean.
#[derive(Debug, Clone)]
pub struct ValueCompositeStrategy {
    factors: Vec<Factor>,
    clip: f64,
}

impl Default for ValueCompositeStrategy {
    fn default() -> Self {
        Self {
            factors: vec![
                Factor::new("earningsYield", true),
                Factor::new("freeCashFlowYield", true),
                Factor::new("roe", true),
                Factor::new("debtToEquity", false),
            ],
            clip: 3.0,
        }
    }
}

impl ValueCompositeStrategy {
    pub fn new(factors: Vec<Factor>, clip: f64) -> Self {
        Self { factors, clip }
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }
}

impl Strategy for ValueCompositeStrategy {
    fn name(&self) -> &str {
        "value_composite"
    }

    fn preprocess(&self, snapshot: &[FundamentalsRow]) -> Result<Vec<FeatureRow>, AnalysisError> {
        validate_snapshot(snapshot)?;
        if self.factors.is_empty() {
            return Err(AnalysisError::PreprocessError(
                "value composite configured without factors".to_string(),
            ));
        }

        // Only rows with every factor present take part in the cross-section.
        let complete: Vec<(&FundamentalsRow, Vec<f64>)> = snapshot
            .iter()
            .filter_map(|row| {
                let values: Option<Vec<f64>> =
                    self.factors.iter().map(|f| row.metric(&f.metric)).collect();
                values.map(|v| (row, v))
            })
            .collect();

        tracing::debug!(
            "value_composite: {} of {} rows have all {} factors",
            complete.len(),
            snapshot.len(),
            self.factors.len()
        );

        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.factors.len());
        for (i, factor) in self.factors.iter().enumerate() {
            let raw: Vec<f64> = complete.iter().map(|(_, values)| values[i]).collect();
            let sign = if factor.higher_is_better { 1.0 } else { -1.0 };
            columns.push(
                clipped_z_scores(&raw, self.clip)
                    .into_iter()
                    .map(|z| z * sign)
                    .collect(),
            );
        }

        Ok(complete
            .iter()
            .enumerate()
            .map(|(row_idx, (row, _))| {
                let features: BTreeMap<String, f64> = self
                    .factors
                    .iter()
                    .zip(columns.iter())
                    .map(|(factor, column)| (factor.metric.clone(), column[row_idx]))
                    .collect();
                FeatureRow {
                    symbol: row.symbol.clone(),
                    features,
                }
            })
            .collect())
    }

    fn predict(&self, features: &[FeatureRow]) -> Result<Vec<ScoredRow>, AnalysisError> {
        validate_features(features)?;

        let scored = features
            .iter()
            .map(|row| {
                let mut total = 0.0;
                for factor in &self.factors {
                    let z = row.features.get(&factor.metric).copied().ok_or_else(|| {
                        AnalysisError::PredictError(format!(
                            "feature '{}' missing for {}",
                            factor.metric, row.symbol
                        ))
                    })?;
                    total += z;
                }
                Ok(ScoredRow {
                    symbol: row.symbol.clone(),
                    score: total / self.factors.len() as f64,
                })
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        Ok(rank_descending(scored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Period;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn row(symbol: &str, ey: f64, fcfy: f64, roe: f64, de: f64) -> FundamentalsRow {
        let metrics: BTreeMap<String, f64> = [
            ("earningsYield", ey),
            ("freeCashFlowYield", fcfy),
            ("roe", roe),
            ("debtToEquity", de),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        FundamentalsRow {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2019, 3, 31).unwrap(),
            calendar_year: 2019,
            period: Period::Q1,
            metrics,
            sector: Some("Industrials".to_string()),
            sub_industry: None,
        }
    }

    #[test]
    fn test_dominant_company_ranks_first() {
        let strategy = ValueCompositeStrategy::default();
        let snapshot = vec![
            row("MID", 0.05, 0.04, 0.12, 1.0),
            row("BEST", 0.10, 0.08, 0.25, 0.2),
            row("WORST", 0.01, 0.00, 0.02, 3.0),
        ];

        let ranked = strategy
            .predict(&strategy.preprocess(&snapshot).unwrap())
            .unwrap();

        let symbols: Vec<&str> = ranked.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BEST", "MID", "WORST"]);
    }

    #[test]
    fn test_leverage_is_sign_inverted() {
        let strategy = ValueCompositeStrategy::new(vec![Factor::new("debtToEquity", false)], 3.0);
        let snapshot = vec![row("LOW", 0.0, 0.0, 0.0, 0.5), row("HIGH", 0.0, 0.0, 0.0, 2.5)];

        let features = strategy.preprocess(&snapshot).unwrap();
        let low = features.iter().find(|f| f.symbol == "LOW").unwrap();
        assert_relative_eq!(low.features["debtToEquity"], 1.0, epsilon = 1e-12);

        let ranked = strategy.predict(&features).unwrap();
        assert_eq!(ranked[0].symbol, "LOW");
    }

    #[test]
    fn test_incomplete_rows_are_excluded() {
        let strategy = ValueCompositeStrategy::default();
        let mut partial = row("PARTIAL", 0.05, 0.04, 0.12, 1.0);
        partial.metrics.remove("roe");
        let snapshot = vec![partial, row("FULL", 0.05, 0.04, 0.12, 1.0)];

        let features = strategy.preprocess(&snapshot).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].symbol, "FULL");
    }

    #[test]
    fn test_ranking_is_deterministic_on_ties() {
        let strategy = ValueCompositeStrategy::default();
        let snapshot = vec![
            row("ZZZ", 0.05, 0.04, 0.12, 1.0),
            row("AAA", 0.05, 0.04, 0.12, 1.0),
        ];
        let first = strategy.predict(&strategy.preprocess(&snapshot).unwrap()).unwrap();
        let second = strategy.predict(&strategy.preprocess(&snapshot).unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].symbol, "AAA");
    }

    #[test]
    fn test_empty_snapshot_yields_no_rows() {
        let strategy = ValueCompositeStrategy::default();
        let features = strategy.preprocess(&[]).unwrap();
        assert!(features.is_empty());
        assert!(strategy.predict(&features).unwrap().is_empty());
    }
}
