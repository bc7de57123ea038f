pub mod aggregate;
pub mod benchmark;
pub mod calendar;
pub mod data_quality;
pub mod engine;
pub mod models;
pub mod prices;
pub mod returns;

#[cfg(test)]
mod tests;

pub use benchmark::{annual_returns, compare_to_benchmark};
pub use calendar::{next_monday, target_trading_date};
pub use data_quality::check_price_quality;
pub use engine::EvaluationEngine;
pub use models::*;
