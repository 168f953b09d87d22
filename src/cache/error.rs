use std::path::PathBuf;
use std::sync::Arc;

/// Why a fetch-and-populate pass produced nothing.
///
/// Every variant ends the request with 404 and leaves the cache untouched.
/// The type is `Clone` because one result is handed to every request joined
/// on the same fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The file could not be opened or read.
    #[error("file unavailable: {}", path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The file opened fine but held zero bytes.
    #[error("file is empty: {}", .0.display())]
    EmptyRead(PathBuf),

    /// Every requester went away before the fetch finished.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::FileUnavailable {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::FileUnavailable { .. } => "unavailable",
            FetchError::EmptyRead(_) => "empty",
            FetchError::Cancelled => "cancelled",
        }
    }
}
