use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings of the loader, read from the environment (and `.env`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Root of the tabular cache.
    pub artifacts_dir: PathBuf,
    /// Provider key; only needed when a cache miss forces a fetch.
    pub api_key: Option<String>,
    pub benchmark_ticker: String,
    /// Worker-pool size for batch key-metric fetches.
    pub fetch_concurrency: usize,
    /// Back off after every this many completed tickers.
    pub rate_limit_every: usize,
    pub rate_limit_sleep_secs: u64,
    /// Provider requests per minute.
    pub fmp_rate_limit: usize,
}

impl LoaderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let default_concurrency = std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(8);

        let config = Self {
            artifacts_dir: lookup("ARTIFACTS_DIR")
                .unwrap_or_else(|| "artifacts".to_string())
                .into(),
            api_key: lookup("API_KEY").filter(|k| !k.trim().is_empty()),
            benchmark_ticker: lookup("BENCHMARK_TICKER").unwrap_or_else(|| "SPY".to_string()),
            fetch_concurrency: lookup("FETCH_CONCURRENCY")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("FETCH_CONCURRENCY must be a positive integer")?
                .unwrap_or(default_concurrency),
            rate_limit_every: lookup("RATE_LIMIT_EVERY")
                .unwrap_or_else(|| "250".to_string())
                .parse()
                .context("RATE_LIMIT_EVERY must be an integer")?,
            rate_limit_sleep_secs: lookup("RATE_LIMIT_SLEEP_SECS")
                .unwrap_or_else(|| "60".to_string())
                .parse()
                .context("RATE_LIMIT_SLEEP_SECS must be an integer")?,
            fmp_rate_limit: lookup("FMP_RATE_LIMIT")
                .unwrap_or_else(|| "300".to_string())
                .parse()
                .context("FMP_RATE_LIMIT must be an integer")?,
        };

        if config.fetch_concurrency == 0 {
            anyhow::bail!("FETCH_CONCURRENCY must be at least 1");
        }

        Ok(config)
    }

    pub fn rate_limit_sleep(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sleep_secs)
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("API_KEY is not set; it is required to fetch from the provider")
    }
}
