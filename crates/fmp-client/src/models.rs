//! Wire types of the Financial Modeling Prep v3 API and their conversion
//! into the shared data model.

use std::collections::BTreeMap;

use analysis_core::{
    normalize_ticker, AnalysisError, Constituent, ConstituentChange, FundamentalsRow, ListedStock,
    Period, PricePoint,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Columns of a key-metrics record that identify the row rather than measure it.
pub const STRUCTURAL_FIELDS: &[&str] = &["symbol", "date", "calendarYear", "period"];

#[derive(Debug, Deserialize)]
pub struct HistoricalPriceResponse {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub historical: Vec<HistoricalClose>,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalClose {
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstituentEntry {
    pub symbol: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub sub_sector: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub date: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub added_security: Option<String>,
    #[serde(default)]
    pub removed_ticker: Option<String>,
    #[serde(default)]
    pub removed_security: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockListEntry {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exchange_short_name: Option<String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, AnalysisError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| AnalysisError::InvalidData(format!("bad date '{}': {}", raw, e)))
}

fn as_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Convert one key-metrics record. Every numeric, finite field that is not
/// structural becomes a metric.
pub fn key_metric_record_to_row(
    ticker: &str,
    record: &Map<String, Value>,
) -> Result<FundamentalsRow, AnalysisError> {
    let symbol = record
        .get("symbol")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(normalize_ticker)
        .unwrap_or_else(|| normalize_ticker(ticker));

    let date = record
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalysisError::InvalidData(format!("{}: record without date", symbol)))
        .and_then(parse_date)?;

    let calendar_year = record
        .get("calendarYear")
        .and_then(as_year)
        .unwrap_or_else(|| chrono::Datelike::year(&date));

    let period: Period = record
        .get("period")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalysisError::InvalidData(format!("{}: record without period", symbol)))?
        .parse()?;

    let metrics: BTreeMap<String, f64> = record
        .iter()
        .filter(|(k, _)| !STRUCTURAL_FIELDS.contains(&k.as_str()))
        .filter_map(|(k, v)| v.as_f64().filter(|x| x.is_finite()).map(|x| (k.clone(), x)))
        .collect();

    Ok(FundamentalsRow {
        symbol,
        date,
        calendar_year,
        period,
        metrics,
        sector: None,
        sub_industry: None,
    })
}

/// Convert a key-metrics response, skipping (and logging) malformed records.
pub fn key_metrics_to_rows(ticker: &str, records: &[Map<String, Value>]) -> Vec<FundamentalsRow> {
    records
        .iter()
        .filter_map(|record| match key_metric_record_to_row(ticker, record) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::warn!("Skipping key-metrics record for {}: {}", ticker, e);
                None
            }
        })
        .collect()
}

pub fn historical_to_points(
    ticker: &str,
    response: HistoricalPriceResponse,
) -> Vec<PricePoint> {
    let ticker = normalize_ticker(response.symbol.as_deref().unwrap_or(ticker));
    response
        .historical
        .into_iter()
        .filter_map(|bar| match parse_date(&bar.date) {
            Ok(date) => Some(PricePoint {
                ticker: ticker.clone(),
                date,
                close: bar.close,
            }),
            Err(e) => {
                tracing::warn!("Skipping {} close: {}", ticker, e);
                None
            }
        })
        .collect()
}

impl From<ConstituentEntry> for Constituent {
    fn from(entry: ConstituentEntry) -> Self {
        Constituent {
            symbol: normalize_ticker(&entry.symbol),
            sector: entry.sector.filter(|s| !s.is_empty()),
            sub_industry: entry.sub_sector.filter(|s| !s.is_empty()),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Convert the membership-change history, skipping (and logging) undated entries.
pub fn changes_to_records(entries: Vec<ChangeEntry>) -> Vec<ConstituentChange> {
    entries
        .into_iter()
        .filter_map(|entry| match parse_date(&entry.date) {
            Ok(date) => Some(ConstituentChange {
                date,
                added_symbol: present(entry.symbol).map(|s| normalize_ticker(&s)),
                added_security: present(entry.added_security),
                removed_symbol: present(entry.removed_ticker).map(|s| normalize_ticker(&s)),
                removed_security: present(entry.removed_security),
                reason: present(entry.reason),
            }),
            Err(e) => {
                tracing::warn!("Skipping index change entry: {}", e);
                None
            }
        })
        .collect()
}

impl From<StockListEntry> for ListedStock {
    fn from(entry: StockListEntry) -> Self {
        ListedStock {
            symbol: entry.symbol,
            name: entry.name,
            exchange_short_name: entry.exchange_short_name,
        }
    }
}
