use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{normalize_ticker, FundamentalsSource, ReportingPeriod};
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};

use crate::assembler::key_metrics_path;
use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::tables::{KeyMetricsTable, Table};

/// Knobs of one batch key-metrics download.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub artifacts_dir: PathBuf,
    pub period: ReportingPeriod,
    pub limit: usize,
    pub concurrency: usize,
    /// Back off after every this many completions; 0 disables the back-off.
    pub rate_limit_every: usize,
    pub rate_limit_sleep: Duration,
}

impl BatchOptions {
    pub fn from_config(config: &LoaderConfig, period: ReportingPeriod, limit: usize) -> Self {
        Self {
            artifacts_dir: config.artifacts_dir.clone(),
            period,
            limit,
            concurrency: config.fetch_concurrency,
            rate_limit_every: config.rate_limit_every,
            rate_limit_sleep: config.rate_limit_sleep(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Tickers fetched and cached, in completion order.
    pub succeeded: Vec<String>,
    /// `(ticker, error)` for every ticker that could not be fetched or cached.
    pub failed: Vec<(String, String)>,
}

#[derive(Default)]
struct Progress {
    completed: usize,
    report: BatchReport,
}

/// Fetch and cache key metrics for every ticker with a bounded worker pool.
///
/// Each distinct ticker is fetched once. A failing ticker is recorded in the
/// report and does not stop the batch.
pub async fn batch_fetch_key_metrics<S>(
    source: Arc<S>,
    tickers: &[String],
    options: &BatchOptions,
) -> BatchReport
where
    S: FundamentalsSource + ?Sized + 'static,
{
    let mut seen = HashSet::new();
    let tickers: Vec<String> = tickers
        .iter()
        .map(|t| normalize_ticker(t).to_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect();
    let total = tickers.len();

    tracing::info!(
        "Fetching {} key metrics for {} tickers (concurrency {}, limit {})",
        options.period,
        total,
        options.concurrency,
        options.limit
    );

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let progress = Arc::new(Mutex::new(Progress::default()));
    let mut handles = Vec::with_capacity(total);

    for ticker in tickers {
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        let progress = Arc::clone(&progress);
        let options = options.clone();

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };

            let result = fetch_one(source.as_ref(), &ticker, &options).await;

            let mut state = progress.lock().await;
            state.completed += 1;
            let done = state.completed;
            match result {
                Ok(rows) => {
                    state.report.succeeded.push(ticker.clone());
                    tracing::info!("[{}/{}] {} => {} rows", done, total, ticker, rows);
                }
                Err(e) => {
                    tracing::warn!(
                        "[{}/{}] {} failed: {}. Finished tickers are {:?}",
                        done,
                        total,
                        ticker,
                        e,
                        state.report.succeeded
                    );
                    state.report.failed.push((ticker.clone(), e.to_string()));
                }
            }
            let back_off = options.rate_limit_every > 0
                && done % options.rate_limit_every == 0
                && done < total;
            drop(state);

            if back_off {
                tracing::info!(
                    "Completed {} tickers, sleeping {}s for the provider rate limit",
                    done,
                    options.rate_limit_sleep.as_secs()
                );
                tokio::time::sleep(options.rate_limit_sleep).await;
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Key-metrics worker aborted: {}", e);
        }
    }

    let report = std::mem::take(&mut progress.lock().await.report);
    tracing::info!(
        "Done! {} tickers cached, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    report
}

async fn fetch_one<S>(source: &S, ticker: &str, options: &BatchOptions) -> Result<usize, LoaderError>
where
    S: FundamentalsSource + ?Sized,
{
    let rows = source
        .key_metrics(ticker, options.period, options.limit)
        .await?;
    let path = key_metrics_path(&options.artifacts_dir, ticker, options.period);
    KeyMetricsTable::write(&path, &rows)?;
    Ok(rows.len())
}
