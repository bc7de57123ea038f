//! Tabular text codecs for the cached collaborator files.
//!
//! Each table is a header row followed by comma-separated records. Readers
//! are tolerant about extra columns; writers emit a fixed column order.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use analysis_core::{
    Constituent, ConstituentChange, FundamentalsRow, ListedStock, Period, PricePoint,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

/// A cached table: how its records are decoded from and encoded to disk.
pub trait Table {
    type Record;

    fn read(path: &Path) -> Result<Vec<Self::Record>, LoaderError>;

    fn write(path: &Path, records: &[Self::Record]) -> Result<(), LoaderError>;
}

fn create_parent(path: &Path) -> Result<(), LoaderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h.trim() == *name))
}

fn non_empty(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn malformed(path: &Path, record: &csv::StringRecord, message: impl Into<String>) -> LoaderError {
    LoaderError::Malformed {
        path: path.display().to_string(),
        line: record.position().map(|p| p.line()).unwrap_or(0),
        message: message.into(),
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Years may have been written as floats by other tooling (`2019.0`).
fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    raw.parse::<i32>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|y| y.fract() == 0.0 && y.abs() < 10_000.0)
            .map(|y| y as i32)
    })
}

/// Per-company key metrics: `{company}/{period}/key_metrics.csv`.
pub struct KeyMetricsTable;

const SYMBOL: &str = "symbol";
const ALT_SYMBOL: &str = "wsymbol";
const DATE: &str = "date";
const CALENDAR_YEAR: &str = "calendarYear";
const PERIOD: &str = "period";

impl Table for KeyMetricsTable {
    type Record = FundamentalsRow;

    fn read(path: &Path) -> Result<Vec<FundamentalsRow>, LoaderError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let symbol_idx = column(&headers, &[SYMBOL]);
        let alt_idx = column(&headers, &[ALT_SYMBOL]);
        let date_idx = column(&headers, &[DATE]);
        let year_idx = column(&headers, &[CALENDAR_YEAR]);
        let period_idx = column(&headers, &[PERIOD]);
        let structural: HashSet<&str> = [SYMBOL, ALT_SYMBOL, DATE, CALENDAR_YEAR, PERIOD].into();
        let metric_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !structural.contains(h.trim()))
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;

            let symbol = non_empty(&record, symbol_idx)
                .or_else(|| non_empty(&record, alt_idx))
                .ok_or_else(|| malformed(path, &record, "row has neither symbol nor wsymbol"))?;
            let date = non_empty(&record, date_idx)
                .as_deref()
                .and_then(parse_date)
                .ok_or_else(|| malformed(path, &record, "missing or invalid date"))?;
            let period: Period = non_empty(&record, period_idx)
                .ok_or_else(|| malformed(path, &record, "missing period"))?
                .parse()
                .map_err(|e: analysis_core::AnalysisError| malformed(path, &record, e.to_string()))?;
            let calendar_year = match non_empty(&record, year_idx) {
                Some(raw) => parse_year(&raw)
                    .ok_or_else(|| malformed(path, &record, format!("invalid calendarYear '{}'", raw)))?,
                None => date.year(),
            };

            let metrics = metric_columns
                .iter()
                .filter_map(|(i, name)| {
                    record
                        .get(*i)
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .filter(|v| v.is_finite())
                        .map(|v| (name.clone(), v))
                })
                .collect();

            rows.push(FundamentalsRow {
                symbol,
                date,
                calendar_year,
                period,
                metrics,
                sector: None,
                sub_industry: None,
            });
        }

        Ok(rows)
    }

    fn write(path: &Path, rows: &[FundamentalsRow]) -> Result<(), LoaderError> {
        create_parent(path)?;
        let metric_names: BTreeSet<&str> = rows
            .iter()
            .flat_map(|r| r.metrics.keys().map(String::as_str))
            .collect();

        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec![SYMBOL, DATE, CALENDAR_YEAR, PERIOD];
        header.extend(metric_names.iter().copied());
        writer.write_record(&header)?;

        for row in rows {
            let mut record = vec![
                row.symbol.clone(),
                row.date.format("%Y-%m-%d").to_string(),
                row.calendar_year.to_string(),
                row.period.as_str().to_string(),
            ];
            record.extend(
                metric_names
                    .iter()
                    .map(|name| row.metric(name).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Index membership: `sp500_stocks.csv`.
pub struct ConstituentsTable;

const SYMBOL_COLUMNS: &[&str] = &["Symbol", "symbol"];
const SECTOR_COLUMNS: &[&str] = &["GICS Sector", "Sector", "sector"];
const SUB_INDUSTRY_COLUMNS: &[&str] = &["GICS Sub-Industry", "SubIndustry", "subSector"];

impl Table for ConstituentsTable {
    type Record = Constituent;

    fn read(path: &Path) -> Result<Vec<Constituent>, LoaderError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let symbol_idx = column(&headers, SYMBOL_COLUMNS).ok_or_else(|| LoaderError::Malformed {
            path: path.display().to_string(),
            line: 1,
            message: "no Symbol column".to_string(),
        })?;
        let sector_idx = column(&headers, SECTOR_COLUMNS);
        let sub_idx = column(&headers, SUB_INDUSTRY_COLUMNS);

        let mut constituents = Vec::new();
        for record in reader.records() {
            let record = record?;
            let Some(symbol) = non_empty(&record, Some(symbol_idx)) else {
                tracing::warn!("{}: skipping constituent row without symbol", path.display());
                continue;
            };
            constituents.push(Constituent {
                symbol,
                sector: non_empty(&record, sector_idx),
                sub_industry: non_empty(&record, sub_idx),
            });
        }
        Ok(constituents)
    }

    fn write(path: &Path, constituents: &[Constituent]) -> Result<(), LoaderError> {
        create_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([SYMBOL_COLUMNS[0], SECTOR_COLUMNS[0], SUB_INDUSTRY_COLUMNS[0]])?;
        for c in constituents {
            writer.write_record([
                c.symbol.as_str(),
                c.sector.as_deref().unwrap_or_default(),
                c.sub_industry.as_deref().unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PriceRecord {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "Close")]
    close: f64,
}

/// Combined daily closes: `sp500_prices.csv`.
pub struct PricesTable;

impl Table for PricesTable {
    type Record = PricePoint;

    fn read(path: &Path) -> Result<Vec<PricePoint>, LoaderError> {
        let mut reader = csv::Reader::from_path(path)?;
        reader
            .deserialize::<PriceRecord>()
            .map(|r| -> Result<PricePoint, LoaderError> {
                let r = r?;
                Ok(PricePoint {
                    ticker: r.ticker,
                    date: r.date,
                    close: r.close,
                })
            })
            .collect()
    }

    fn write(path: &Path, points: &[PricePoint]) -> Result<(), LoaderError> {
        create_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        for p in points {
            writer.serialize(PriceRecord {
                date: p.date,
                ticker: p.ticker.clone(),
                close: p.close,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockRecord {
    symbol: String,
    name: Option<String>,
    exchange_short_name: Option<String>,
}

/// Provider-wide stock list: `stocks_global.csv`.
pub struct StockListTable;

impl Table for StockListTable {
    type Record = ListedStock;

    fn read(path: &Path) -> Result<Vec<ListedStock>, LoaderError> {
        let mut reader = csv::Reader::from_path(path)?;
        reader
            .deserialize::<StockRecord>()
            .map(|r| -> Result<ListedStock, LoaderError> {
                let r = r?;
                Ok(ListedStock {
                    symbol: r.symbol,
                    name: r.name,
                    exchange_short_name: r.exchange_short_name,
                })
            })
            .collect()
    }

    fn write(path: &Path, stocks: &[ListedStock]) -> Result<(), LoaderError> {
        create_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        for s in stocks {
            writer.serialize(StockRecord {
                symbol: s.symbol.clone(),
                name: s.name.clone(),
                exchange_short_name: s.exchange_short_name.clone(),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChangeRecord {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Added Ticker")]
    added_symbol: Option<String>,
    #[serde(rename = "Added Security")]
    added_security: Option<String>,
    #[serde(rename = "Removed Ticker")]
    removed_symbol: Option<String>,
    #[serde(rename = "Removed Security")]
    removed_security: Option<String>,
    #[serde(rename = "Reason")]
    reason: Option<String>,
}

/// Index membership changes: `sp500_stocks_change_history.csv`.
pub struct ChangeHistoryTable;

impl Table for ChangeHistoryTable {
    type Record = ConstituentChange;

    fn read(path: &Path) -> Result<Vec<ConstituentChange>, LoaderError> {
        let mut reader = csv::Reader::from_path(path)?;
        reader
            .deserialize::<ChangeRecord>()
            .map(|r| -> Result<ConstituentChange, LoaderError> {
                let r = r?;
                Ok(ConstituentChange {
                    date: r.date,
                    added_symbol: r.added_symbol,
                    added_security: r.added_security,
                    removed_symbol: r.removed_symbol,
                    removed_security: r.removed_security,
                    reason: r.reason,
                })
            })
            .collect()
    }

    fn write(path: &Path, changes: &[ConstituentChange]) -> Result<(), LoaderError> {
        create_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        for c in changes {
            writer.serialize(ChangeRecord {
                date: c.date,
                added_symbol: c.added_symbol.clone(),
                added_security: c.added_security.clone(),
                removed_symbol: c.removed_symbol.clone(),
                removed_security: c.removed_security.clone(),
                reason: c.reason.clone(),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Keep the stocks listed on one of `exchanges` (exact short names).
pub fn filter_exchanges(stocks: Vec<ListedStock>, exchanges: &[String]) -> Vec<ListedStock> {
    stocks
        .into_iter()
        .filter(|s| {
            s.exchange_short_name
                .as_ref()
                .is_some_and(|e| exchanges.iter().any(|x| x == e))
        })
        .collect()
}
