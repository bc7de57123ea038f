use analysis_core::{Partition, Period, PriceSource, ReportingPeriod, Strategy};
use evaluation_engine::{
    check_price_quality, compare_to_benchmark, BenchmarkComparison, BenchmarkReturn,
    EvaluationConfig, EvaluationEngine, EvaluationReport, PriceQualityReport,
};
use serde::Serialize;

use crate::assembler::{dataset_tickers, DatasetAssembler};
use crate::error::LoaderError;

/// Everything one `evaluate` run produces.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutput {
    pub partition: Partition,
    pub report: EvaluationReport,
    pub benchmark: Vec<BenchmarkReturn>,
    /// Set when the benchmark could not be computed for the evaluated years.
    pub benchmark_error: Option<String>,
    pub comparison: Vec<BenchmarkComparison>,
    pub price_quality: PriceQualityReport,
}

/// Evaluation settings matching the reporting period of the dataset: Q1
/// rows for quarterly fundamentals, FY rows for annual ones.
pub fn evaluation_config(period: ReportingPeriod, benchmark_ticker: &str) -> EvaluationConfig {
    let periods = match period {
        ReportingPeriod::Quarter => vec![Period::Q1],
        ReportingPeriod::Annual => vec![Period::Annual],
    };
    EvaluationConfig {
        periods,
        benchmark_ticker: benchmark_ticker.to_string(),
        ..EvaluationConfig::default()
    }
}

/// Assemble the dataset, load prices (cache-or-fetch), evaluate `strategy`
/// on `partition` and compare it with the benchmark.
pub async fn evaluate_strategy<S>(
    assembler: &DatasetAssembler,
    prices_source: &S,
    strategy: Box<dyn Strategy>,
    config: EvaluationConfig,
    partition: Partition,
    refresh_prices: bool,
) -> Result<EvaluationOutput, LoaderError>
where
    S: PriceSource + ?Sized,
{
    let dataset = assembler.assemble()?;
    let tickers = dataset_tickers(&dataset, &[config.benchmark_ticker.as_str()]);
    let prices = assembler
        .load_prices(prices_source, &tickers, refresh_prices)
        .await?;

    let price_quality = check_price_quality(&prices);
    if !price_quality.is_clean() {
        tracing::warn!(
            "Price history has {} duplicate, {} non-positive and {} weekend rows",
            price_quality.duplicate_points,
            price_quality.non_positive_closes,
            price_quality.weekend_points
        );
    }

    let mut engine = EvaluationEngine::new(strategy, config).with_data(dataset, prices);
    let report = engine.evaluate_partition(partition)?;

    let (benchmark, benchmark_error) = match engine.calculate_spy_annual_return() {
        Ok(benchmark) => (benchmark, None),
        Err(e) => {
            tracing::warn!("Benchmark unavailable: {}", e);
            (Vec::new(), Some(e.to_string()))
        }
    };
    let comparison = compare_to_benchmark(&report.aggregate, &benchmark);

    Ok(EvaluationOutput {
        partition,
        report,
        benchmark,
        benchmark_error,
        comparison,
        price_quality,
    })
}
