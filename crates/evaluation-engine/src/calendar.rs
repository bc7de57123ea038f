use chrono::{Datelike, Duration, NaiveDate};

/// First Monday on or after `date`. A Monday maps to itself.
pub fn next_monday(date: NaiveDate) -> NaiveDate {
    let days_past_monday = date.weekday().num_days_from_monday() as i64;
    let offset = (7 - days_past_monday) % 7;
    date + Duration::days(offset)
}

/// Entry date for a fundamentals row: the Monday on or after
/// `fiscal_date + delay_days`, a proxy for the first tradeable day once the
/// report is public.
pub fn target_trading_date(fiscal_date: NaiveDate, delay_days: i64) -> NaiveDate {
    next_monday(fiscal_date + Duration::days(delay_days))
}
