use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{Datelike, NaiveDate};

use analysis_core::{AnalysisError, PricePoint};

use crate::models::*;

/// Annual buy-and-hold return of `ticker` for every year in `years`:
/// `(last close - first close) / first close` over the year's trading days.
///
/// Fails with `DataUnavailable` when the ticker has no observation in a year.
pub fn annual_returns(
    prices: &[PricePoint],
    ticker: &str,
    years: Range<i32>,
) -> Result<Vec<BenchmarkReturn>, AnalysisError> {
    let mut by_year: BTreeMap<i32, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for point in prices.iter().filter(|p| p.ticker == ticker) {
        by_year
            .entry(point.date.year())
            .or_default()
            .push((point.date, point.close));
    }

    years
        .map(|year| {
            let mut series = by_year.get(&year).cloned().unwrap_or_default();
            series.sort_by_key(|(date, _)| *date);

            let (first, last) = match (series.first(), series.last()) {
                (Some(first), Some(last)) => (*first, *last),
                _ => {
                    return Err(AnalysisError::DataUnavailable(format!(
                        "no {} prices in {}",
                        ticker, year
                    )))
                }
            };
            if first.1 <= 0.0 {
                return Err(AnalysisError::InvalidData(format!(
                    "{} closed at {} on {}",
                    ticker, first.1, first.0
                )));
            }

            Ok(BenchmarkReturn {
                ticker: ticker.to_string(),
                year,
                first_date: first.0,
                first_close: first.1,
                last_date: last.0,
                last_close: last.1,
                annual_return: (last.1 - first.1) / first.1,
            })
        })
        .collect()
}

/// Line up each cell's 1-year mean with the benchmark return of its year.
/// Years without a benchmark figure compare against NaN.
pub fn compare_to_benchmark(
    aggregate: &AggregateResult,
    benchmark: &[BenchmarkReturn],
) -> Vec<BenchmarkComparison> {
    aggregate
        .cells
        .iter()
        .map(|cell| {
            let benchmark_return = benchmark
                .iter()
                .find(|b| b.year == cell.year)
                .map(|b| b.annual_return)
                .unwrap_or(f64::NAN);
            BenchmarkComparison {
                year: cell.year,
                period: cell.period,
                strategy_return: cell.one_year.mean,
                benchmark_return,
                excess_return: cell.one_year.mean - benchmark_return,
            }
        })
        .collect()
}
