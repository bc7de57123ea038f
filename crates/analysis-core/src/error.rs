use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Required static data (dataset, price history) was never loaded.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Expected external data is missing and no fallback applies.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Preprocess error: {0}")]
    PreprocessError(String),

    #[error("Predict error: {0}")]
    PredictError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}
