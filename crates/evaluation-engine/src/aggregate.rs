use statrs::statistics::Statistics;

use crate::models::*;

/// Mean and population standard deviation of `values`. NaN for an empty sample.
pub fn return_stats(values: &[f64]) -> ReturnStats {
    ReturnStats {
        mean: values.iter().mean(),
        std: values.iter().population_std_dev(),
        count: values.len(),
    }
}

pub fn summarize_cell(cell: &EvaluationCell) -> CellSummary {
    CellSummary {
        year: cell.year,
        period: cell.period,
        pick_count: cell.picks.len(),
        one_year: return_stats(&cell.returns(Horizon::OneYear)),
        two_year: return_stats(&cell.returns(Horizon::TwoYear)),
    }
}

/// Mean-of-means across cells: each cell counts once regardless of how many
/// symbols it held. Cells whose mean is NaN are left out.
pub fn overall_stats(summaries: &[CellSummary], horizon: Horizon) -> ReturnStats {
    let means: Vec<f64> = summaries
        .iter()
        .map(|s| match horizon {
            Horizon::OneYear => s.one_year.mean,
            Horizon::TwoYear => s.two_year.mean,
        })
        .filter(|m| !m.is_nan())
        .collect();
    return_stats(&means)
}

pub fn aggregate(strategy_name: &str, cells: &[EvaluationCell]) -> AggregateResult {
    let summaries: Vec<CellSummary> = cells.iter().map(summarize_cell).collect();
    AggregateResult {
        strategy_name: strategy_name.to_string(),
        overall_one_year: overall_stats(&summaries, Horizon::OneYear),
        overall_two_year: overall_stats(&summaries, Horizon::TwoYear),
        cells: summaries,
    }
}
