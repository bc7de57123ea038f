use std::collections::{HashMap, HashSet};

use analysis_core::FundamentalsRow;

use crate::calendar::target_trading_date;
use crate::models::{PricedRow, SymbolReturn};
use crate::prices::PriceIndex;

/// Restrict `rows` to the pick set and inner-join each to the close on its
/// own target trading date. Rows without a close on that exact date drop out.
pub fn price_rows(
    rows: &[FundamentalsRow],
    picks: &HashSet<&str>,
    index: &PriceIndex,
    entry_delay_days: i64,
) -> Vec<PricedRow> {
    rows.iter()
        .filter(|row| picks.contains(row.symbol.as_str()))
        .filter_map(|row| {
            let target_date = target_trading_date(row.date, entry_delay_days);
            index.close(&row.symbol, target_date).map(|close| PricedRow {
                symbol: row.symbol.clone(),
                fiscal_date: row.date,
                target_date,
                close,
            })
        })
        .collect()
}

/// Inner join of base and forward priced rows on symbol, yielding
/// `(forward_close - base_close) / base_close`. Symbols missing on either side
/// are dropped; when the forward side repeats a symbol the earliest fiscal
/// date wins.
pub fn forward_returns(base: &[PricedRow], forward: &[PricedRow]) -> Vec<SymbolReturn> {
    let mut forward_by_symbol: HashMap<&str, &PricedRow> = HashMap::new();
    for row in forward {
        forward_by_symbol
            .entry(row.symbol.as_str())
            .and_modify(|existing| {
                if row.fiscal_date < existing.fiscal_date {
                    *existing = row;
                }
            })
            .or_insert(row);
    }

    base.iter()
        .filter(|b| b.close > 0.0)
        .filter_map(|b| {
            forward_by_symbol.get(b.symbol.as_str()).map(|f| SymbolReturn {
                symbol: b.symbol.clone(),
                base_date: b.target_date,
                base_close: b.close,
                forward_date: f.target_date,
                forward_close: f.close,
                forward_return: (f.close - b.close) / b.close,
            })
        })
        .collect()
}
