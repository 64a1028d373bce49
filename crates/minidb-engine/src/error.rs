//! Engine error types.

use std::path::PathBuf;

use thiserror::Error;

use minidb_common::config::ConfigError;
use minidb_common::RowId;
use minidb_storage::StorageError;
use minidb_wal::WalError;

/// Result alias for engine operations.
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Errors surfaced by the table, catalog, and database layers.
#[derive(Debug, Error)]
pub enum DbError {
    /// A storage-layer failure (pager, cache, paged file).
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A redo-log failure.
    #[error(transparent)]
    Wal(#[from] WalError),

    /// An invalid database configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem work outside the pager (directories, renames, catalog).
    #[error("I/O failure on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A table file is not what its header claims.
    #[error("corrupt table file {path}: {reason}")]
    Corrupt {
        /// Path of the table file.
        path: PathBuf,
        /// What check failed.
        reason: String,
    },

    /// A record does not fit one page.
    #[error("record size {record_size} exceeds page size {page_size}")]
    RecordTooLarge {
        /// Record size derived from the schema.
        record_size: usize,
        /// Configured page size.
        page_size: usize,
    },

    /// The number of supplied values does not match the column count.
    #[error("value count mismatch: expected {expected}, got {actual}")]
    ValueCountMismatch {
        /// Column count of the schema.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// A value cannot be coerced to its column's type.
    #[error("invalid value for column {column}: {reason}")]
    InvalidValue {
        /// Column the value was destined for.
        column: String,
        /// Why the coercion failed.
        reason: String,
    },

    /// A WHERE or SET clause referenced a column the schema lacks.
    #[error("unknown column: {name}")]
    UnknownColumn {
        /// The missing column name.
        name: String,
    },

    /// CREATE TABLE listed the same column twice.
    #[error("duplicate column name: {name}")]
    DuplicateColumn {
        /// The repeated column name.
        name: String,
    },

    /// CREATE TABLE with no columns.
    #[error("table must have at least one column")]
    NoColumns,

    /// UPDATE with no SET clauses.
    #[error("no columns to update")]
    EmptyUpdate,

    /// The named table does not exist.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Requested table name.
        name: String,
    },

    /// CREATE TABLE for a name that already exists.
    #[error("table already exists: {name}")]
    TableExists {
        /// Conflicting table name.
        name: String,
    },

    /// ALTER TABLE ADD for a column that already exists.
    #[error("column already exists on table {table}: {column}")]
    ColumnExists {
        /// Table being altered.
        table: String,
        /// Conflicting column name.
        column: String,
    },

    /// A point operation targeted a missing or deleted row.
    #[error("row not found: {row_id}")]
    RowNotFound {
        /// The requested row id.
        row_id: RowId,
    },

    /// A redo record's post-image does not match the schema's record size.
    #[error("redo record size mismatch: expected {expected}, got {actual}")]
    RedoSizeMismatch {
        /// Record size derived from the schema.
        expected: usize,
        /// Length of the logged post-image.
        actual: usize,
    },

    /// A worker abandoned a submitted task without producing a result.
    #[error("worker abandoned task: {reason}")]
    TaskAbandoned {
        /// What the caller was waiting for.
        reason: String,
    },
}
