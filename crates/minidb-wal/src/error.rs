//! WAL error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for log operations.
pub type WalResult<T> = std::result::Result<T, WalError>;

/// Errors surfaced by the log manager.
#[derive(Debug, Error)]
pub enum WalError {
    /// Opening, appending to, or truncating the log file failed.
    #[error("log I/O failure on {path}: {source}")]
    Io {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}
