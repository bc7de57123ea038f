use std::collections::HashSet;

use chrono::{Datelike, Weekday};

use analysis_core::PricePoint;

use crate::models::*;

/// Scan price history for violations of the daily-close invariants: one row
/// per (ticker, date), strictly positive close, trading days only.
pub fn check_price_quality(prices: &[PricePoint]) -> PriceQualityReport {
    let mut seen: HashSet<(&str, chrono::NaiveDate)> = HashSet::new();
    let mut tickers: HashSet<&str> = HashSet::new();
    let mut duplicate_points = 0usize;
    let mut non_positive_closes = 0usize;
    let mut weekend_points = 0usize;
    let mut warnings: Vec<PriceWarning> = Vec::new();

    for point in prices {
        tickers.insert(point.ticker.as_str());

        if !seen.insert((point.ticker.as_str(), point.date)) {
            duplicate_points += 1;
            warnings.push(PriceWarning {
                date: point.date,
                ticker: point.ticker.clone(),
                warning_type: "duplicate".to_string(),
                message: "More than one close for this ticker and date".to_string(),
            });
        }

        if point.close.is_nan() || point.close <= 0.0 {
            non_positive_closes += 1;
            warnings.push(PriceWarning {
                date: point.date,
                ticker: point.ticker.clone(),
                warning_type: "non_positive_close".to_string(),
                message: format!("Close {} is not positive", point.close),
            });
        }

        if matches!(point.date.weekday(), Weekday::Sat | Weekday::Sun) {
            weekend_points += 1;
            warnings.push(PriceWarning {
                date: point.date,
                ticker: point.ticker.clone(),
                warning_type: "weekend_date".to_string(),
                message: format!("{} is not a trading day", point.date.weekday()),
            });
        }
    }

    // Cap warnings to 100 to avoid oversized reports
    warnings.truncate(100);

    PriceQualityReport {
        total_points: prices.len(),
        tickers: tickers.len(),
        duplicate_points,
        non_positive_closes,
        weekend_points,
        warnings,
    }
}
