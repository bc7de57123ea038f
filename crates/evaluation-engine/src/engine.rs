use std::collections::{HashMap, HashSet};
use std::ops::Range;

use rayon::prelude::*;

use analysis_core::{
    AnalysisError, Dataset, FundamentalsRow, Partition, Period, PricePoint, Strategy,
};

use crate::aggregate::aggregate;
use crate::benchmark::annual_returns;
use crate::models::*;
use crate::prices::PriceIndex;
use crate::returns::{forward_returns, price_rows};

type CellRows = HashMap<(i32, Period), Vec<FundamentalsRow>>;

/// Drives a strategy across historical (year, period) cells and turns its
/// picks into 1-year and 2-year forward returns.
///
/// The engine owns the dataset and price history for its lifetime; they are
/// read-only once loaded. Cells share no mutable state and are evaluated in
/// parallel, then collected back in (year, period) order.
pub struct EvaluationEngine {
    strategy: Box<dyn Strategy>,
    config: EvaluationConfig,
    dataset: Option<Dataset>,
    prices: Option<Vec<PricePoint>>,
    /// Year range of the most recent evaluation; the benchmark reuses it.
    last_years: Option<Range<i32>>,
}

impl EvaluationEngine {
    pub fn new(strategy: Box<dyn Strategy>, config: EvaluationConfig) -> Self {
        Self {
            strategy,
            config,
            dataset: None,
            prices: None,
            last_years: None,
        }
    }

    pub fn with_data(mut self, dataset: Dataset, prices: Vec<PricePoint>) -> Self {
        self.dataset = Some(dataset);
        self.prices = Some(prices);
        self
    }

    pub fn load_dataset(&mut self, dataset: Dataset) {
        self.dataset = Some(dataset);
    }

    pub fn load_prices(&mut self, prices: Vec<PricePoint>) {
        self.prices = Some(prices);
    }

    /// Swap the strategy; the loaded data stays.
    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn last_years(&self) -> Option<Range<i32>> {
        self.last_years.clone()
    }

    /// Evaluate `data`, or the test partition of the loaded dataset when no
    /// override is given.
    pub fn evaluate(
        &mut self,
        data: Option<&[FundamentalsRow]>,
    ) -> Result<EvaluationReport, AnalysisError> {
        let rows = match data {
            Some(rows) => rows,
            None => self
                .dataset
                .as_ref()
                .map(|d| d.test.as_slice())
                .ok_or_else(|| {
                    AnalysisError::NotInitialized(
                        "no evaluation data supplied and no dataset loaded".to_string(),
                    )
                })?,
        };

        let (report, years) = self.run(rows)?;
        self.last_years = Some(years);
        Ok(report)
    }

    /// Evaluate one partition of the loaded dataset.
    pub fn evaluate_partition(
        &mut self,
        partition: Partition,
    ) -> Result<EvaluationReport, AnalysisError> {
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            AnalysisError::NotInitialized("no dataset loaded".to_string())
        })?;

        let (report, years) = self.run(dataset.get(partition))?;
        self.last_years = Some(years);
        Ok(report)
    }

    /// Annual return of the benchmark ticker for every year of the last
    /// evaluation, from the full loaded price history.
    pub fn calculate_spy_annual_return(&self) -> Result<Vec<BenchmarkReturn>, AnalysisError> {
        let years = self.last_years.clone().ok_or_else(|| {
            AnalysisError::NotInitialized("evaluate() has not been run".to_string())
        })?;
        let prices = self.prices.as_ref().ok_or_else(|| {
            AnalysisError::NotInitialized("price history not loaded".to_string())
        })?;

        annual_returns(prices, &self.config.benchmark_ticker, years)
    }

    fn run(
        &self,
        data: &[FundamentalsRow],
    ) -> Result<(EvaluationReport, Range<i32>), AnalysisError> {
        let (min_date, min_year, max_year) = match (
            data.iter().map(|r| r.date).min(),
            data.iter().map(|r| r.calendar_year).min(),
            data.iter().map(|r| r.calendar_year).max(),
        ) {
            (Some(d), Some(lo), Some(hi)) => (d, lo, hi),
            _ => {
                return Err(AnalysisError::NotInitialized(
                    "evaluation data is empty".to_string(),
                ))
            }
        };

        let prices = self.prices.as_ref().ok_or_else(|| {
            AnalysisError::DataUnavailable("price history not loaded".to_string())
        })?;
        let index = PriceIndex::build(prices, Some(min_date));
        if index.is_empty() {
            return Err(AnalysisError::DataUnavailable(format!(
                "no price history on or after {}",
                min_date
            )));
        }

        // The final year only serves as a forward target.
        let years = min_year..max_year;
        let groups = group_cells(data);
        let cells: Vec<(i32, Period)> = years
            .clone()
            .flat_map(|y| self.config.periods.iter().map(move |p| (y, *p)))
            .collect();

        tracing::info!(
            "Evaluating strategy '{}' over {} cells ({}..{}), {} rows, {} prices across {} tickers",
            self.strategy.name(),
            cells.len(),
            years.start,
            years.end,
            data.len(),
            index.len(),
            index.tickers()
        );

        let evaluated: Vec<EvaluationCell> = cells
            .par_iter()
            .map(|&(year, period)| self.evaluate_cell(year, period, &groups, &index))
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        let aggregate = aggregate(self.strategy.name(), &evaluated);
        tracing::info!(
            "Strategy '{}': 1y mean {:.4} (std {:.4}), 2y mean {:.4} (std {:.4})",
            aggregate.strategy_name,
            aggregate.overall_one_year.mean,
            aggregate.overall_one_year.std,
            aggregate.overall_two_year.mean,
            aggregate.overall_two_year.std
        );

        Ok((
            EvaluationReport {
                cells: evaluated,
                aggregate,
            },
            years,
        ))
    }

    fn evaluate_cell(
        &self,
        year: i32,
        period: Period,
        groups: &CellRows,
        index: &PriceIndex,
    ) -> Result<EvaluationCell, AnalysisError> {
        let no_rows: Vec<FundamentalsRow> = Vec::new();
        let rows = groups.get(&(year, period)).unwrap_or(&no_rows);
        let picks = self.pick(rows)?;
        let pick_set: HashSet<&str> = picks.iter().map(String::as_str).collect();

        let delay = self.config.entry_delay_days;
        let base = price_rows(rows, &pick_set, index, delay);
        let [one_year, two_year] = [Horizon::OneYear, Horizon::TwoYear].map(|horizon| {
            let forward_rows = groups
                .get(&(year + horizon.years(), period))
                .unwrap_or(&no_rows);
            let forward = price_rows(forward_rows, &pick_set, index, delay);
            forward_returns(&base, &forward)
        });

        if !picks.is_empty() && (one_year.is_empty() || two_year.is_empty()) {
            tracing::debug!(
                "{} {}: {} picks, {} priced, {} 1y returns, {} 2y returns",
                year,
                period,
                picks.len(),
                base.len(),
                one_year.len(),
                two_year.len()
            );
        }

        Ok(EvaluationCell {
            year,
            period,
            picks,
            one_year,
            two_year,
        })
    }

    /// Run the strategy over one cell and keep the first `top_k` distinct symbols.
    fn pick(&self, rows: &[FundamentalsRow]) -> Result<Vec<String>, AnalysisError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let features = self.strategy.preprocess(rows)?;
        let ranked = self.strategy.predict(&features)?;

        let mut seen = HashSet::new();
        Ok(ranked
            .into_iter()
            .map(|r| r.symbol)
            .filter(|s| seen.insert(s.clone()))
            .take(self.config.top_k)
            .collect())
    }
}

fn group_cells(data: &[FundamentalsRow]) -> CellRows {
    let mut groups: CellRows = HashMap::new();
    for row in data {
        groups
            .entry((row.calendar_year, row.period))
            .or_default()
            .push(row.clone());
    }
    groups
}
