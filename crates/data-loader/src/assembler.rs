use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use analysis_core::{
    normalize_ticker, Constituent, ConstituentChange, ConstituentSource, Dataset, FundamentalsRow,
    ListedStock, PricePoint, PriceRange, PriceSource, ReportingPeriod,
};

use crate::cache::load_or_fetch;
use crate::error::LoaderError;
use crate::tables::{
    filter_exchanges, ChangeHistoryTable, ConstituentsTable, KeyMetricsTable, PricesTable,
    StockListTable, Table,
};

pub const CONSTITUENTS_FILE: &str = "sp500_stocks.csv";
pub const PRICES_FILE: &str = "sp500_prices.csv";
pub const CHANGE_HISTORY_FILE: &str = "sp500_stocks_change_history.csv";
pub const STOCK_LIST_FILE: &str = "stocks_global.csv";
pub const KEY_METRICS_FILE: &str = "key_metrics.csv";

/// Builds the partitioned fundamentals table and the price history from the
/// artifacts directory, fetching through the providers on a cache miss.
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    artifacts_dir: PathBuf,
    period: ReportingPeriod,
}

impl DatasetAssembler {
    pub fn new(artifacts_dir: impl Into<PathBuf>, period: ReportingPeriod) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            period,
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn constituents_path(&self) -> PathBuf {
        self.artifacts_dir.join(CONSTITUENTS_FILE)
    }

    pub fn prices_path(&self) -> PathBuf {
        self.artifacts_dir.join(PRICES_FILE)
    }

    pub fn change_history_path(&self) -> PathBuf {
        self.artifacts_dir.join(CHANGE_HISTORY_FILE)
    }

    pub fn stock_list_path(&self) -> PathBuf {
        self.artifacts_dir.join(STOCK_LIST_FILE)
    }

    /// `{artifacts}/{company}/{quarter|annual}/key_metrics.csv`, company lower-cased.
    pub fn key_metrics_path(&self, company: &str) -> PathBuf {
        key_metrics_path(&self.artifacts_dir, company, self.period)
    }

    /// Merge every cached per-company fundamentals file with the constituent
    /// reference table and partition the result by calendar year.
    ///
    /// Fails with `DataUnavailable` when the reference table or every
    /// fundamentals file is missing.
    pub fn assemble(&self) -> Result<Dataset, LoaderError> {
        let reference_path = self.constituents_path();
        if !reference_path.is_file() {
            return Err(LoaderError::unavailable(format!(
                "constituent reference file {} not found",
                reference_path.display()
            )));
        }
        let constituents = ConstituentsTable::read(&reference_path)?;
        let fundamentals = self.load_fundamentals()?;

        let merged = merge_reference(fundamentals, &constituents);
        let dataset = Dataset::partition(merged);
        tracing::info!(
            "Assembled dataset: train {}, validation {}, test {} rows",
            dataset.train.len(),
            dataset.validation.len(),
            dataset.test.len()
        );
        Ok(dataset)
    }

    /// Concatenate the fundamentals of every company directory that has a
    /// key-metrics file for this reporting period.
    pub fn load_fundamentals(&self) -> Result<Vec<FundamentalsRow>, LoaderError> {
        if !self.artifacts_dir.is_dir() {
            return Err(LoaderError::unavailable(format!(
                "artifacts directory {} not found",
                self.artifacts_dir.display()
            )));
        }

        let mut companies: Vec<PathBuf> = std::fs::read_dir(&self.artifacts_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        companies.sort();

        let mut rows = Vec::new();
        let mut files = 0usize;
        for company_dir in companies {
            let path = company_dir.join(self.period.as_str()).join(KEY_METRICS_FILE);
            if !path.is_file() {
                tracing::debug!("No {} key metrics under {}", self.period, company_dir.display());
                continue;
            }
            rows.extend(KeyMetricsTable::read(&path)?);
            files += 1;
        }

        if files == 0 {
            return Err(LoaderError::unavailable(format!(
                "no {} key-metrics files under {}",
                self.period,
                self.artifacts_dir.display()
            )));
        }
        tracing::info!("Loaded {} fundamentals rows from {} companies", rows.len(), files);
        Ok(rows)
    }

    pub async fn load_constituents<S>(
        &self,
        source: &S,
        refresh: bool,
    ) -> Result<Vec<Constituent>, LoaderError>
    where
        S: ConstituentSource + ?Sized,
    {
        load_or_fetch::<ConstituentsTable, _, _>(&self.constituents_path(), refresh, || {
            source.constituents()
        })
        .await
    }

    /// Index additions and removals, for survivorship checks on the
    /// current-constituent universe.
    pub async fn load_change_history<S>(
        &self,
        source: &S,
        refresh: bool,
    ) -> Result<Vec<ConstituentChange>, LoaderError>
    where
        S: ConstituentSource + ?Sized,
    {
        load_or_fetch::<ChangeHistoryTable, _, _>(&self.change_history_path(), refresh, || {
            source.constituent_changes()
        })
        .await
    }

    /// Global stock list restricted to `exchanges`; the cache keeps every exchange.
    pub async fn load_stock_list<S>(
        &self,
        source: &S,
        exchanges: &[String],
        refresh: bool,
    ) -> Result<Vec<ListedStock>, LoaderError>
    where
        S: ConstituentSource + ?Sized,
    {
        let stocks = load_or_fetch::<StockListTable, _, _>(&self.stock_list_path(), refresh, || {
            source.stock_list()
        })
        .await?;
        Ok(filter_exchanges(stocks, exchanges))
    }

    /// Full close history of `tickers`, read from the combined prices file or
    /// fetched for the maximum available range.
    pub async fn load_prices<S>(
        &self,
        source: &S,
        tickers: &[String],
        refresh: bool,
    ) -> Result<Vec<PricePoint>, LoaderError>
    where
        S: PriceSource + ?Sized,
    {
        load_or_fetch::<PricesTable, _, _>(&self.prices_path(), refresh, || {
            source.closes(tickers, PriceRange::Max)
        })
        .await
    }
}

pub fn key_metrics_path(artifacts_dir: &Path, company: &str, period: ReportingPeriod) -> PathBuf {
    artifacts_dir
        .join(company.trim().to_lowercase())
        .join(period.as_str())
        .join(KEY_METRICS_FILE)
}

/// Left join of fundamentals onto the reference table by normalized ticker.
/// Rows repeating an earlier `(symbol, date, period)` are dropped.
pub fn merge_reference(
    rows: Vec<FundamentalsRow>,
    constituents: &[Constituent],
) -> Vec<FundamentalsRow> {
    let reference: HashMap<String, &Constituent> = constituents
        .iter()
        .map(|c| (normalize_ticker(&c.symbol), c))
        .collect();

    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    let merged: Vec<FundamentalsRow> = rows
        .into_iter()
        .filter_map(|mut row| {
            row.symbol = normalize_ticker(&row.symbol);
            if !seen.insert((row.symbol.clone(), row.date, row.period)) {
                duplicates += 1;
                return None;
            }
            if let Some(c) = reference.get(&row.symbol) {
                row.sector = c.sector.clone();
                row.sub_industry = c.sub_industry.clone();
            }
            Some(row)
        })
        .collect();

    if duplicates > 0 {
        tracing::warn!("Dropped {} duplicate fundamentals rows", duplicates);
    }
    merged
}

/// Distinct tickers of a dataset, sorted, with `extra` (the benchmark) appended.
pub fn dataset_tickers(dataset: &Dataset, extra: &[&str]) -> Vec<String> {
    let mut tickers: Vec<String> = [&dataset.train, &dataset.validation, &dataset.test]
        .into_iter()
        .flatten()
        .map(|r| r.symbol.clone())
        .chain(extra.iter().map(|t| normalize_ticker(t)))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    tickers.sort();
    tickers
}
