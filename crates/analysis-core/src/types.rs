use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Fiscal reporting period of a fundamentals row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    Q1,
    Q2,
    Q3,
    Q4,
    /// Full fiscal year ("FY" at the provider, "annual" in research notes).
    Annual,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Q1 => "Q1",
            Period::Q2 => "Q2",
            Period::Q3 => "Q3",
            Period::Q4 => "Q4",
            Period::Annual => "FY",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q1" => Ok(Period::Q1),
            "Q2" => Ok(Period::Q2),
            "Q3" => Ok(Period::Q3),
            "Q4" => Ok(Period::Q4),
            "FY" | "ANNUAL" => Ok(Period::Annual),
            other => Err(AnalysisError::InvalidData(format!(
                "unknown reporting period '{}'",
                other
            ))),
        }
    }
}

/// Granularity requested from the fundamentals provider. Also names the
/// cache sub-directory (`{company}/{quarter|annual}/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportingPeriod {
    Quarter,
    Annual,
}

impl ReportingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingPeriod::Quarter => "quarter",
            ReportingPeriod::Annual => "annual",
        }
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportingPeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quarter" | "quarterly" => Ok(ReportingPeriod::Quarter),
            "annual" | "fy" => Ok(ReportingPeriod::Annual),
            other => Err(AnalysisError::InvalidData(format!(
                "unknown reporting granularity '{}'",
                other
            ))),
        }
    }
}

/// One company-period record of key metrics.
///
/// `(symbol, date, period)` is unique within a dataset partition. Metrics are
/// an open set keyed by the provider's column name; a metric that was empty or
/// non-numeric in the source is simply absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRow {
    pub symbol: String,
    /// Fiscal period end.
    pub date: NaiveDate,
    pub calendar_year: i32,
    pub period: Period,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub sub_industry: Option<String>,
}

impl FundamentalsRow {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().filter(|v| v.is_finite())
    }
}

/// One daily close for a ticker on a trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: f64,
}

/// Index constituent with its GICS classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub symbol: String,
    pub sector: Option<String>,
    pub sub_industry: Option<String>,
}

/// One index membership change: a ticker added, removed, or both on `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentChange {
    pub date: NaiveDate,
    pub added_symbol: Option<String>,
    pub added_security: Option<String>,
    pub removed_symbol: Option<String>,
    pub removed_security: Option<String>,
    pub reason: Option<String>,
}

/// Entry of the provider's global stock list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedStock {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange_short_name: Option<String>,
}

/// Date span requested from a price provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceRange {
    /// Full available history.
    Max,
    Between(NaiveDate, NaiveDate),
}

/// Feature-engineered row handed from `Strategy::preprocess` to `Strategy::predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub symbol: String,
    pub features: BTreeMap<String, f64>,
}

/// Output row of `Strategy::predict`: higher `score` is more desirable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub symbol: String,
    pub score: f64,
}

/// Normalize a ticker to the price provider's convention (`BRK.B` -> `BRK-B`).
pub fn normalize_ticker(symbol: &str) -> String {
    symbol.trim().replace('.', "-")
}
