use std::collections::HashMap;

use chrono::NaiveDate;

use analysis_core::PricePoint;

/// Close lookup by (ticker, trading date).
#[derive(Debug, Clone, Default)]
pub struct PriceIndex {
    closes: HashMap<String, HashMap<NaiveDate, f64>>,
    points: usize,
}

impl PriceIndex {
    /// Index `prices`, keeping only dates on/after `since` when given. The
    /// first row seen for a (ticker, date) wins.
    pub fn build(prices: &[PricePoint], since: Option<NaiveDate>) -> Self {
        let mut closes: HashMap<String, HashMap<NaiveDate, f64>> = HashMap::new();
        let mut points = 0usize;

        for point in prices {
            if since.is_some_and(|s| point.date < s) {
                continue;
            }
            let by_date = closes.entry(point.ticker.clone()).or_default();
            if let std::collections::hash_map::Entry::Vacant(slot) = by_date.entry(point.date) {
                slot.insert(point.close);
                points += 1;
            }
        }

        Self { closes, points }
    }

    /// Exact-date lookup; there is no nearest-date fallback.
    pub fn close(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.closes.get(ticker).and_then(|m| m.get(&date)).copied()
    }

    pub fn tickers(&self) -> usize {
        self.closes.len()
    }

    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }
}
