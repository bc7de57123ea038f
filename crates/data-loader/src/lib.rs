//! Dataset assembly and data acquisition for strategy evaluation: tabular
//! caches, cache-or-fetch, the batch key-metrics downloader and the
//! end-to-end evaluation pipeline used by the `data-loader` binary.

pub mod assembler;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod tables;

pub use assembler::{dataset_tickers, merge_reference, DatasetAssembler};
pub use batch::{batch_fetch_key_metrics, BatchOptions, BatchReport};
pub use cache::load_or_fetch;
pub use config::LoaderConfig;
pub use error::LoaderError;
pub use pipeline::{evaluate_strategy, evaluation_config, EvaluationOutput};
pub use provider::{provider_from_config, OfflineProvider, Provider};
