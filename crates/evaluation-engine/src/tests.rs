use std::collections::{BTreeMap, HashSet};

use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate};

use analysis_core::*;

use crate::calendar::target_trading_date;
use crate::engine::EvaluationEngine;
use crate::models::*;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Helper: a Q1 fundamentals row with a single `score` metric.
fn row(symbol: &str, fiscal_date: &str, score: f64) -> FundamentalsRow {
    let fiscal = date(fiscal_date);
    let mut metrics = BTreeMap::new();
    metrics.insert("score".to_string(), score);
    FundamentalsRow {
        symbol: symbol.to_string(),
        date: fiscal,
        calendar_year: fiscal.year(),
        period: Period::Q1,
        metrics,
        sector: Some("Industrials".to_string()),
        sub_industry: None,
    }
}

fn price(ticker: &str, d: NaiveDate, close: f64) -> PricePoint {
    PricePoint {
        ticker: ticker.to_string(),
        date: d,
        close,
    }
}

/// Helper: a close on the entry Monday of a row dated `fiscal_date`.
fn entry_price(ticker: &str, fiscal_date: &str, close: f64) -> PricePoint {
    price(ticker, target_trading_date(date(fiscal_date), 30), close)
}

/// Ranks by the `score` metric, highest first.
struct ScoreStrategy;

impl Strategy for ScoreStrategy {
    fn name(&self) -> &str {
        "score"
    }

    fn preprocess(&self, snapshot: &[FundamentalsRow]) -> Result<Vec<FeatureRow>, AnalysisError> {
        snapshot
            .iter()
            .map(|r| {
                let score = r.metric("score").ok_or_else(|| {
                    AnalysisError::PreprocessError(format!("{} has no score", r.symbol))
                })?;
                let mut features = BTreeMap::new();
                features.insert("score".to_string(), score);
                Ok(FeatureRow {
                    symbol: r.symbol.clone(),
                    features,
                })
            })
            .collect()
    }

    fn predict(&self, features: &[FeatureRow]) -> Result<Vec<ScoredRow>, AnalysisError> {
        let mut rows: Vec<ScoredRow> = features
            .iter()
            .map(|f| ScoredRow {
                symbol: f.symbol.clone(),
                score: f.features["score"],
            })
            .collect();
        rows.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(rows)
    }
}

/// Always returns the same ranking, whatever the snapshot holds.
struct FixedStrategy(Vec<&'static str>);

impl Strategy for FixedStrategy {
    fn name(&self) -> &str {
        "fixed"
    }

    fn preprocess(&self, _snapshot: &[FundamentalsRow]) -> Result<Vec<FeatureRow>, AnalysisError> {
        Ok(Vec::new())
    }

    fn predict(&self, _features: &[FeatureRow]) -> Result<Vec<ScoredRow>, AnalysisError> {
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(i, s)| ScoredRow {
                symbol: s.to_string(),
                score: -(i as f64),
            })
            .collect())
    }
}

struct FailingStrategy;

impl Strategy for FailingStrategy {
    fn name(&self) -> &str {
        "failing"
    }

    fn preprocess(&self, _snapshot: &[FundamentalsRow]) -> Result<Vec<FeatureRow>, AnalysisError> {
        Ok(Vec::new())
    }

    fn predict(&self, _features: &[FeatureRow]) -> Result<Vec<ScoredRow>, AnalysisError> {
        Err(AnalysisError::PredictError("symbol column missing".to_string()))
    }
}

fn engine(strategy: Box<dyn Strategy>, prices: Vec<PricePoint>) -> EvaluationEngine {
    let mut engine = EvaluationEngine::new(strategy, EvaluationConfig::default());
    engine.load_prices(prices);
    engine
}

/// Helper: ACME reported each March from 2019 to 2021.
fn acme_rows() -> Vec<FundamentalsRow> {
    vec![
        row("ACME", "2019-03-01", 1.0),
        row("ACME", "2020-03-02", 1.0),
        row("ACME", "2021-03-01", 1.0),
    ]
}

fn acme_prices() -> Vec<PricePoint> {
    vec![
        price("ACME", date("2019-04-01"), 100.0),
        price("ACME", date("2020-04-06"), 120.0),
        price("ACME", date("2021-04-05"), 150.0),
    ]
}

// =============================================================================
// Test 1: Worked example: ACME 2019 Q1 -> 2020 Q1 returns 20%
// =============================================================================

#[test]
fn test_acme_forward_returns() {
    let mut engine = engine(Box::new(ScoreStrategy), acme_prices());
    let report = engine.evaluate(Some(&acme_rows())).unwrap();

    // 2021 is the last year in the data so only 2019 and 2020 are evaluated
    let years: Vec<i32> = report.cells.iter().map(|c| c.year).collect();
    assert_eq!(years, vec![2019, 2020]);
    assert_eq!(engine.last_years(), Some(2019..2021));

    let cell = &report.cells[0];
    assert_eq!(cell.picks, vec!["ACME".to_string()]);
    assert_eq!(cell.one_year.len(), 1);
    assert_eq!(cell.one_year[0].base_date, date("2019-04-01"));
    assert_eq!(cell.one_year[0].forward_date, date("2020-04-06"));
    assert_relative_eq!(cell.one_year[0].forward_return, 0.20, epsilon = 1e-12);
    assert_relative_eq!(cell.two_year[0].forward_return, 0.50, epsilon = 1e-12);

    let summary = &report.aggregate.cells[0];
    assert_relative_eq!(summary.one_year.mean, 0.20, epsilon = 1e-12);
    assert_relative_eq!(summary.one_year.std, 0.0, epsilon = 1e-12);
}

// =============================================================================
// Test 2: The final evaluated year may lack a 2-year target; that is silent
// =============================================================================

#[test]
fn test_missing_two_year_horizon_is_silent() {
    let mut engine = engine(Box::new(ScoreStrategy), acme_prices());
    let report = engine.evaluate(Some(&acme_rows())).unwrap();

    let last = &report.cells[1];
    assert_eq!(last.year, 2020);
    assert_relative_eq!(last.one_year[0].forward_return, 0.25, epsilon = 1e-12);
    assert!(last.two_year.is_empty());
    assert!(report.aggregate.cells[1].two_year.mean.is_nan());

    // Overall 2y only counts the cell that had a 2y return
    assert_eq!(report.aggregate.overall_two_year.count, 1);
    assert_relative_eq!(report.aggregate.overall_two_year.mean, 0.50, epsilon = 1e-12);
}

// =============================================================================
// Test 3: Forward horizons come from years y+1 and y+2, never y
// =============================================================================

#[test]
fn test_forward_rows_come_from_later_years() {
    let mut rows = Vec::new();
    let mut prices = Vec::new();
    for year in 2015..2021 {
        let fiscal = format!("{}-03-01", year);
        rows.push(row("AAA", &fiscal, 1.0));
        rows.push(row("BBB", &fiscal, 2.0));
        prices.push(entry_price("AAA", &fiscal, 100.0 + year as f64));
        prices.push(entry_price("BBB", &fiscal, 50.0 + year as f64));
    }

    let mut engine = engine(Box::new(ScoreStrategy), prices);
    let report = engine.evaluate(Some(&rows)).unwrap();
    assert_eq!(report.cells.len(), 5);

    for cell in &report.cells {
        for r in &cell.one_year {
            assert_eq!(r.base_date.year(), cell.year);
            assert_eq!(r.forward_date.year(), cell.year + 1);
        }
        for r in &cell.two_year {
            assert_eq!(r.forward_date.year(), cell.year + 2);
        }
    }
}

// =============================================================================
// Test 4: Mean-of-means weights every cell equally
// =============================================================================

#[test]
fn test_overall_is_mean_of_cell_means() {
    // 2016: one symbol returning 10%. 2017: three symbols averaging 20%.
    let rows = vec![
        row("A", "2016-03-01", 1.0),
        row("A", "2017-03-01", 1.0),
        row("B", "2017-03-01", 1.0),
        row("C", "2017-03-01", 1.0),
        row("D", "2017-03-01", 1.0),
        row("B", "2018-03-01", 1.0),
        row("C", "2018-03-01", 1.0),
        row("D", "2018-03-01", 1.0),
    ];
    let prices = vec![
        entry_price("A", "2016-03-01", 100.0),
        entry_price("A", "2017-03-01", 110.0),
        entry_price("B", "2017-03-01", 100.0),
        entry_price("C", "2017-03-01", 100.0),
        entry_price("D", "2017-03-01", 100.0),
        entry_price("B", "2018-03-01", 110.0),
        entry_price("C", "2018-03-01", 120.0),
        entry_price("D", "2018-03-01", 130.0),
    ];

    let mut engine = engine(Box::new(ScoreStrategy), prices);
    let report = engine.evaluate(Some(&rows)).unwrap();

    assert_relative_eq!(report.aggregate.cells[0].one_year.mean, 0.10, epsilon = 1e-12);
    assert_relative_eq!(report.aggregate.cells[1].one_year.mean, 0.20, epsilon = 1e-12);
    // A pooled per-symbol mean would be 0.175
    assert_relative_eq!(report.aggregate.overall_one_year.mean, 0.15, epsilon = 1e-12);
}

// =============================================================================
// Test 5: Empty pick set gives NaN statistics, no error, no zero in overall
// =============================================================================

#[test]
fn test_empty_pick_set_yields_nan_cell() {
    let mut engine = engine(Box::new(FixedStrategy(vec![])), acme_prices());
    let report = engine.evaluate(Some(&acme_rows())).unwrap();

    assert_eq!(report.cells.len(), 2);
    for (cell, summary) in report.cells.iter().zip(&report.aggregate.cells) {
        assert!(cell.picks.is_empty());
        assert!(cell.one_year.is_empty());
        assert!(summary.one_year.mean.is_nan());
        assert!(summary.one_year.std.is_nan());
    }
    assert!(report.aggregate.overall_one_year.mean.is_nan());
    assert_eq!(report.aggregate.overall_one_year.count, 0);
}

// =============================================================================
// Test 6: Pick sets are capped at K and returns only cover joined symbols
// =============================================================================

#[test]
fn test_pick_set_capped_and_returns_are_inner_joined() {
    let mut rows = Vec::new();
    let mut prices = Vec::new();
    for i in 0..40 {
        let symbol = format!("S{:02}", i);
        rows.push(row(&symbol, "2018-03-01", i as f64));
        rows.push(row(&symbol, "2019-03-01", i as f64));
        prices.push(entry_price(&symbol, "2018-03-01", 100.0));
        // Every third symbol has no close on its forward target date
        if i % 3 != 0 {
            prices.push(entry_price(&symbol, "2019-03-01", 105.0));
        }
    }

    let mut engine = engine(Box::new(ScoreStrategy), prices);
    let report = engine.evaluate(Some(&rows)).unwrap();
    let cell = &report.cells[0];

    assert_eq!(cell.picks.len(), TOP_K);
    // Highest scores first
    assert_eq!(cell.picks[0], "S39");

    let picks: HashSet<&str> = cell.picks.iter().map(String::as_str).collect();
    for r in &cell.one_year {
        assert!(picks.contains(r.symbol.as_str()));
        let idx: usize = r.symbol[1..].parse().unwrap();
        assert_ne!(idx % 3, 0, "{} has no forward close and must be dropped", r.symbol);
    }
    // S10..S39 picked; of those S12, S15, ..., S39 (10 symbols) are missing forward prices
    assert_eq!(cell.one_year.len(), 20);
}

// =============================================================================
// Test 7: No nearest-date fallback when the exact target day has no close
// =============================================================================

#[test]
fn test_no_nearest_date_fallback() {
    let prices = vec![
        // One day after the 2019 target
        price("ACME", date("2019-04-02"), 100.0),
        price("ACME", date("2020-04-06"), 120.0),
    ];
    let mut engine = engine(Box::new(ScoreStrategy), prices);
    let report = engine.evaluate(Some(&acme_rows())).unwrap();

    assert_eq!(report.cells[0].picks, vec!["ACME".to_string()]);
    assert!(report.cells[0].one_year.is_empty());
}

// =============================================================================
// Test 8: Only Q1 is evaluated by default; other periods are opt-in
// =============================================================================

#[test]
fn test_period_restriction() {
    let mut rows = acme_rows();
    let mut q2 = row("ACME", "2019-06-28", 1.0);
    q2.period = Period::Q2;
    rows.push(q2);

    let mut default_engine = engine(Box::new(ScoreStrategy), acme_prices());
    let report = default_engine.evaluate(Some(&rows)).unwrap();
    assert!(report.cells.iter().all(|c| c.period == Period::Q1));

    let config = EvaluationConfig {
        periods: vec![Period::Q1, Period::Q2],
        ..EvaluationConfig::default()
    };
    let mut both = EvaluationEngine::new(Box::new(ScoreStrategy), config);
    both.load_prices(acme_prices());
    let report = both.evaluate(Some(&rows)).unwrap();
    let cells: Vec<(i32, Period)> = report.cells.iter().map(|c| (c.year, c.period)).collect();
    assert_eq!(
        cells,
        vec![
            (2019, Period::Q1),
            (2019, Period::Q2),
            (2020, Period::Q1),
            (2020, Period::Q2),
        ]
    );
    // The Q2 cell has a pick but no forward Q2 rows
    assert_eq!(report.cells[1].picks.len(), 1);
    assert!(report.cells[1].one_year.is_empty());
}

// =============================================================================
// Test 9: Identical inputs give identical results
// =============================================================================

#[test]
fn test_evaluate_is_idempotent() {
    let mut rows = Vec::new();
    let mut prices = Vec::new();
    for year in 2015..2020 {
        for (i, symbol) in ["AAA", "BBB", "CCC", "DDD"].iter().enumerate() {
            let fiscal = format!("{}-03-01", year);
            rows.push(row(symbol, &fiscal, (i as f64) * (year as f64 % 3.0)));
            prices.push(entry_price(symbol, &fiscal, 10.0 + i as f64 + (year - 2015) as f64));
        }
    }

    let mut engine = engine(Box::new(ScoreStrategy), prices);
    let first = engine.evaluate(Some(&rows)).unwrap();
    let second = engine.evaluate(Some(&rows)).unwrap();
    assert_eq!(first, second);
}

// =============================================================================
// Test 10: Error conditions
// =============================================================================

#[test]
fn test_not_initialized_without_data() {
    let mut engine = engine(Box::new(ScoreStrategy), acme_prices());
    let err = engine.evaluate(None).unwrap_err();
    assert!(matches!(err, AnalysisError::NotInitialized(_)));

    let err = engine.evaluate(Some(&[])).unwrap_err();
    assert!(matches!(err, AnalysisError::NotInitialized(_)));

    let err = engine.evaluate_partition(Partition::Validation).unwrap_err();
    assert!(matches!(err, AnalysisError::NotInitialized(_)));
}

#[test]
fn test_data_unavailable_without_prices() {
    let mut engine = EvaluationEngine::new(Box::new(ScoreStrategy), EvaluationConfig::default());
    let err = engine.evaluate(Some(&acme_rows())).unwrap_err();
    assert!(matches!(err, AnalysisError::DataUnavailable(_)));

    // Prices that all predate the evaluation window
    engine.load_prices(vec![price("ACME", date("2010-01-04"), 10.0)]);
    let err = engine.evaluate(Some(&acme_rows())).unwrap_err();
    assert!(matches!(err, AnalysisError::DataUnavailable(_)));
}

#[test]
fn test_strategy_failure_aborts_evaluation() {
    let mut engine = engine(Box::new(FailingStrategy), acme_prices());
    let err = engine.evaluate(Some(&acme_rows())).unwrap_err();
    assert_eq!(err, AnalysisError::PredictError("symbol column missing".to_string()));
    assert_eq!(engine.last_years(), None);
}

// =============================================================================
// Test 11: Default data is the test partition; other partitions on request
// =============================================================================

#[test]
fn test_partition_selection() {
    let mut rows = acme_rows();
    rows.push(row("OLD", "2008-03-03", 1.0));
    rows.push(row("OLD", "2009-03-02", 1.0));
    let dataset = Dataset::partition(rows);

    let mut prices = acme_prices();
    prices.push(entry_price("OLD", "2008-03-03", 40.0));
    prices.push(entry_price("OLD", "2009-03-02", 20.0));

    let mut engine = EvaluationEngine::new(Box::new(ScoreStrategy), EvaluationConfig::default())
        .with_data(dataset, prices);

    let test = engine.evaluate(None).unwrap();
    assert_eq!(test.cells[0].year, 2019);
    assert_eq!(test.cells[0].picks, vec!["ACME".to_string()]);

    let validation = engine.evaluate_partition(Partition::Validation).unwrap();
    assert_eq!(validation.cells.len(), 1);
    assert_eq!(validation.cells[0].year, 2008);
    assert_relative_eq!(validation.cells[0].one_year[0].forward_return, -0.5, epsilon = 1e-12);
    assert_eq!(engine.last_years(), Some(2008..2009));
}

// =============================================================================
// Test 12: Benchmark over the last evaluated year range
// =============================================================================

#[test]
fn test_benchmark_annual_return() {
    let mut prices = acme_prices();
    prices.extend([
        price("SPY", date("2019-12-31"), 321.86),
        price("SPY", date("2019-01-02"), 250.18),
        price("SPY", date("2020-01-02"), 324.87),
        price("SPY", date("2020-12-31"), 373.88),
    ]);
    let mut engine = engine(Box::new(ScoreStrategy), prices);

    let err = engine.calculate_spy_annual_return().unwrap_err();
    assert!(matches!(err, AnalysisError::NotInitialized(_)));

    let report = engine.evaluate(Some(&acme_rows())).unwrap();
    let benchmark = engine.calculate_spy_annual_return().unwrap();
    assert_eq!(benchmark.len(), 2);
    assert_eq!(benchmark[0].year, 2019);
    assert_relative_eq!(
        benchmark[0].annual_return,
        (321.86 - 250.18) / 250.18,
        epsilon = 1e-12
    );

    let comparison = crate::benchmark::compare_to_benchmark(&report.aggregate, &benchmark);
    assert_eq!(comparison.len(), 2);
    assert_relative_eq!(
        comparison[0].excess_return,
        0.20 - (321.86 - 250.18) / 250.18,
        epsilon = 1e-12
    );
}

#[test]
fn test_benchmark_missing_year_is_data_unavailable() {
    let mut prices = acme_prices();
    prices.push(price("SPY", date("2019-01-02"), 250.18));
    let mut engine = engine(Box::new(ScoreStrategy), prices);
    engine.evaluate(Some(&acme_rows())).unwrap();

    let err = engine.calculate_spy_annual_return().unwrap_err();
    assert!(matches!(err, AnalysisError::DataUnavailable(_)));
}

// =============================================================================
// Test 13: Reports serialize; NaN statistics become null
// =============================================================================

#[test]
fn test_report_serializes_nan_as_null() {
    let mut engine = engine(Box::new(FixedStrategy(vec![])), acme_prices());
    let report = engine.evaluate(Some(&acme_rows())).unwrap();
    let json = serde_json::to_value(&report.aggregate).unwrap();
    assert!(json["overall_one_year"]["mean"].is_null());
    assert_eq!(json["cells"][0]["period"], "Q1");
}
