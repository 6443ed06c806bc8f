//! Error types for the dcprobe result store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for result store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting check records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The log directory could not be created. Fatal for an invocation.
    #[error("failed to create log directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be written. Recovered by the check run.
    #[error("failed to write {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row {line} in {path}")]
    Malformed { path: PathBuf, line: usize },
}
