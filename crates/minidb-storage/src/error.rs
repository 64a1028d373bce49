//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the pager, cache, and paged-file layers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Opening the backing file failed.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path of the file.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A positioned read or write failed.
    #[error("I/O failure on {path} at offset {offset}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Byte offset of the failed operation.
        offset: u64,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A caller-supplied buffer does not match the configured page size.
    #[error("page size mismatch: expected {expected} bytes, got {actual}")]
    PageSizeMismatch {
        /// Configured page size.
        expected: usize,
        /// Length of the buffer handed in.
        actual: usize,
    },

    /// Allocating a node-local page buffer failed.
    #[error("failed to allocate a {size}-byte page buffer on node {node}")]
    AllocFailed {
        /// Target NUMA node.
        node: usize,
        /// Requested buffer size.
        size: usize,
    },
}
