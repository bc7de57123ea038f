//! data-loader: cache S&P 500 fundamentals and prices, then evaluate stock-picking
//! strategies on the assembled dataset.
//!
//! Usage:
//!   cargo run -p data-loader -- constituents --refresh
//!   cargo run -p data-loader -- changes
//!   cargo run -p data-loader -- metrics --period quarter --limit 1000
//!   cargo run -p data-loader -- prices
//!   cargo run -p data-loader -- stocks --exchanges NASDAQ,NYSE
//!   cargo run -p data-loader -- evaluate --strategy metric:roe --partition validation

use std::sync::Arc;

use analysis_core::{normalize_ticker, Partition, ReportingPeriod};
use anyhow::Context;
use data_loader::{
    batch_fetch_key_metrics, evaluate_strategy, evaluation_config, provider_from_config,
    BatchOptions, DatasetAssembler, LoaderConfig,
};
use fundamental_analysis::strategy_from_name;

const DEFAULT_LIMIT: usize = 1000;

fn flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn option<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  data-loader constituents [--refresh]          Cache the S&P 500 constituent list");
    eprintln!("  data-loader changes [--refresh]               Cache the S&P 500 change history");
    eprintln!("  data-loader metrics [--period quarter|annual] [--limit N] [--symbols A B ...]");
    eprintln!("                                                Download key metrics per company");
    eprintln!("  data-loader prices [--refresh]                Cache daily closes of all constituents");
    eprintln!("  data-loader stocks --exchanges NASDAQ,NYSE [--refresh]");
    eprintln!("                                                Cache and filter the global stock list");
    eprintln!("  data-loader evaluate [--strategy value|metric:<name>[:asc]]");
    eprintln!("                       [--partition train|validation|test] [--period quarter|annual]");
    eprintln!("                       [--refresh]");
    eprintln!("                                                Evaluate a strategy, print JSON report");
    eprintln!();
    eprintln!("Environment: ARTIFACTS_DIR, API_KEY, BENCHMARK_TICKER, FETCH_CONCURRENCY,");
    eprintln!("             RATE_LIMIT_EVERY, RATE_LIMIT_SLEEP_SECS, FMP_RATE_LIMIT");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "data_loader=info,evaluation_engine=info,fmp_client=warn".into()
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        usage();
    };
    let refresh = flag(&args, "--refresh");

    let config = LoaderConfig::from_env()?;
    let provider = provider_from_config(&config);
    let period: ReportingPeriod = option(&args, "--period")
        .unwrap_or("quarter")
        .parse()
        .context("--period must be quarter or annual")?;
    let assembler = DatasetAssembler::new(&config.artifacts_dir, period);

    tracing::info!(
        "data-loader {}: artifacts={}, period={}",
        command,
        config.artifacts_dir.display(),
        period
    );

    match command {
        "constituents" => {
            let constituents = assembler
                .load_constituents(provider.as_ref(), refresh)
                .await?;
            tracing::info!("{} constituents", constituents.len());
        }
        "changes" => {
            let changes = assembler
                .load_change_history(provider.as_ref(), refresh)
                .await?;
            let removed = changes.iter().filter(|c| c.removed_symbol.is_some()).count();
            tracing::info!("{} index changes, {} removals", changes.len(), removed);
        }
        "metrics" => {
            let limit: usize = option(&args, "--limit")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("--limit must be a positive integer")?
                .unwrap_or(DEFAULT_LIMIT);

            let tickers: Vec<String> = match args.iter().position(|a| a == "--symbols") {
                Some(idx) => args[idx + 1..]
                    .iter()
                    .take_while(|a| !a.starts_with("--"))
                    .cloned()
                    .collect(),
                None => assembler
                    .load_constituents(provider.as_ref(), false)
                    .await?
                    .into_iter()
                    .map(|c| c.symbol)
                    .collect(),
            };
            if tickers.is_empty() {
                anyhow::bail!("no tickers to fetch");
            }

            let options = BatchOptions::from_config(&config, period, limit);
            let report = batch_fetch_key_metrics(Arc::clone(&provider), &tickers, &options).await;
            if !report.failed.is_empty() {
                tracing::warn!(
                    "{} tickers failed: {:?}",
                    report.failed.len(),
                    report.failed.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>()
                );
            }
        }
        "prices" => {
            let mut tickers: Vec<String> = assembler
                .load_constituents(provider.as_ref(), false)
                .await?
                .iter()
                .map(|c| normalize_ticker(&c.symbol))
                .collect();
            tickers.push(normalize_ticker(&config.benchmark_ticker));
            tickers.sort();
            tickers.dedup();

            let prices = assembler
                .load_prices(provider.as_ref(), &tickers, refresh)
                .await?;
            tracing::info!("{} price rows for {} tickers", prices.len(), tickers.len());
        }
        "stocks" => {
            let exchanges: Vec<String> = option(&args, "--exchanges")
                .context("--exchanges is required, e.g. --exchanges NASDAQ,NYSE")?
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();

            let stocks = assembler
                .load_stock_list(provider.as_ref(), &exchanges, refresh)
                .await?;
            tracing::info!("{} stocks listed on {}", stocks.len(), exchanges.join(","));
        }
        "evaluate" => {
            let strategy = strategy_from_name(option(&args, "--strategy").unwrap_or("value"))?;
            let partition: Partition = option(&args, "--partition")
                .unwrap_or("test")
                .parse()?;
            let eval_config =
                evaluation_config(period, &normalize_ticker(&config.benchmark_ticker));

            let output = evaluate_strategy(
                &assembler,
                provider.as_ref(),
                strategy,
                eval_config,
                partition,
                refresh,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => usage(),
    }

    Ok(())
}
