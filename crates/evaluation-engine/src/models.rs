use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use analysis_core::Period;

/// Maximum number of symbols taken from a strategy's ranking per cell.
pub const TOP_K: usize = 30;

/// Configuration for an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub top_k: usize,
    /// Reporting periods evaluated within each calendar year.
    pub periods: Vec<Period>,
    /// Calendar days after the fiscal date before the entry Monday is searched.
    pub entry_delay_days: i64,
    /// Reference instrument for the annual benchmark return.
    pub benchmark_ticker: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            top_k: TOP_K,
            periods: vec![Period::Q1],
            entry_delay_days: 30,
            benchmark_ticker: "SPY".to_string(),
        }
    }
}

/// Forward horizon of a return measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    OneYear,
    TwoYear,
}

impl Horizon {
    pub fn years(&self) -> i32 {
        match self {
            Horizon::OneYear => 1,
            Horizon::TwoYear => 2,
        }
    }
}

/// A fundamentals row joined to the close on its target trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedRow {
    pub symbol: String,
    pub fiscal_date: NaiveDate,
    pub target_date: NaiveDate,
    pub close: f64,
}

/// Forward return of one picked symbol over one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReturn {
    pub symbol: String,
    pub base_date: NaiveDate,
    pub base_close: f64,
    pub forward_date: NaiveDate,
    pub forward_close: f64,
    pub forward_return: f64,
}

/// One (year, period) evaluation: the picks and their forward returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCell {
    pub year: i32,
    pub period: Period,
    pub picks: Vec<String>,
    pub one_year: Vec<SymbolReturn>,
    pub two_year: Vec<SymbolReturn>,
}

impl EvaluationCell {
    pub fn returns(&self, horizon: Horizon) -> Vec<f64> {
        let records = match horizon {
            Horizon::OneYear => &self.one_year,
            Horizon::TwoYear => &self.two_year,
        };
        records.iter().map(|r| r.forward_return).collect()
    }
}

/// Mean and population standard deviation of a return sample. Both are NaN
/// when the sample is empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReturnStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl PartialEq for ReturnStats {
    /// NaN compares equal to NaN so identical runs compare equal.
    fn eq(&self, other: &Self) -> bool {
        fn same(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b
        }
        same(self.mean, other.mean) && same(self.std, other.std) && self.count == other.count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    pub year: i32,
    pub period: Period,
    pub pick_count: usize,
    pub one_year: ReturnStats,
    pub two_year: ReturnStats,
}

/// Per-cell statistics plus the mean-of-means across cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub strategy_name: String,
    pub cells: Vec<CellSummary>,
    /// `count` is the number of cells with a defined mean.
    pub overall_one_year: ReturnStats,
    pub overall_two_year: ReturnStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub cells: Vec<EvaluationCell>,
    pub aggregate: AggregateResult,
}

// --- Benchmark ---

/// Buy-and-hold return of the reference instrument within one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReturn {
    pub ticker: String,
    pub year: i32,
    pub first_date: NaiveDate,
    pub first_close: f64,
    pub last_date: NaiveDate,
    pub last_close: f64,
    pub annual_return: f64,
}

/// Strategy 1-year mean vs benchmark annual return for one year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub year: i32,
    pub period: Period,
    pub strategy_return: f64,
    pub benchmark_return: f64,
    /// Strategy return - benchmark return.
    pub excess_return: f64,
}

// --- Price history quality ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceWarning {
    pub date: NaiveDate,
    pub ticker: String,
    pub warning_type: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQualityReport {
    pub total_points: usize,
    pub tickers: usize,
    pub duplicate_points: usize,
    pub non_positive_closes: usize,
    pub weekend_points: usize,
    pub warnings: Vec<PriceWarning>,
}

impl PriceQualityReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_points == 0 && self.non_positive_closes == 0 && self.weekend_points == 0
    }
}
