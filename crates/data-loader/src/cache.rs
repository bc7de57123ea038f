use std::future::Future;
use std::path::Path;

use analysis_core::AnalysisError;

use crate::error::LoaderError;
use crate::tables::Table;

/// Read `path` through `T` unless it is missing or `refresh` is set; in that
/// case await `fetch`, persist its result at `path`, and return it.
///
/// Cached files are never checked for staleness.
pub async fn load_or_fetch<T, F, Fut>(
    path: &Path,
    refresh: bool,
    fetch: F,
) -> Result<Vec<T::Record>, LoaderError>
where
    T: Table,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T::Record>, AnalysisError>>,
{
    if !refresh && path.is_file() {
        tracing::debug!("Cache hit: {}", path.display());
        return T::read(path);
    }

    tracing::info!("{}: fetching from provider", path.display());
    let records = fetch().await?;
    T::write(path, &records).map_err(|e| {
        LoaderError::Analysis(AnalysisError::CacheError(format!(
            "failed to persist {}: {}",
            path.display(),
            e
        )))
    })?;
    tracing::info!("Cached {} records at {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PricesTable;
    use analysis_core::PricePoint;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn point(close: f64) -> PricePoint {
        PricePoint {
            ticker: "SPY".to_string(),
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            close,
        }
    }

    #[tokio::test]
    async fn test_miss_fetches_and_persists_then_hits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices").join("sp500_prices.csv");
        let calls = AtomicUsize::new(0);

        let fetched = load_or_fetch::<PricesTable, _, _>(&path, false, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![point(320.5)])
        })
        .await
        .unwrap();
        assert_eq!(fetched, vec![point(320.5)]);
        assert!(path.is_file());

        let cached = load_or_fetch::<PricesTable, _, _>(&path, false, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![point(0.0)])
        })
        .await
        .unwrap();
        assert_eq!(cached, vec![point(320.5)]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_overwrites_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sp500_prices.csv");
        PricesTable::write(&path, &[point(1.0)]).unwrap();

        let refreshed =
            load_or_fetch::<PricesTable, _, _>(&path, true, || async { Ok(vec![point(2.0)]) })
                .await
                .unwrap();
        assert_eq!(refreshed, vec![point(2.0)]);
        assert_eq!(PricesTable::read(&path).unwrap(), vec![point(2.0)]);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sp500_prices.csv");

        let err = load_or_fetch::<PricesTable, _, _>(&path, false, || async {
            Err(AnalysisError::ApiError("HTTP 401".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LoaderError::Analysis(AnalysisError::ApiError(_))));
        assert!(!path.exists());
    }
}
