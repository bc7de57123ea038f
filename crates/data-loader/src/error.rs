use analysis_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}:{line}: {message}")]
    Malformed {
        path: String,
        line: u64,
        message: String,
    },
}

impl LoaderError {
    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        LoaderError::Analysis(AnalysisError::DataUnavailable(message.into()))
    }

    /// True when the underlying condition is `AnalysisError::DataUnavailable`.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, LoaderError::Analysis(AnalysisError::DataUnavailable(_)))
    }
}

impl From<LoaderError> for AnalysisError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Analysis(e) => e,
            LoaderError::Io(e) => AnalysisError::CacheError(e.to_string()),
            LoaderError::Csv(e) => AnalysisError::CacheError(e.to_string()),
            other @ LoaderError::Malformed { .. } => AnalysisError::InvalidData(other.to_string()),
        }
    }
}
