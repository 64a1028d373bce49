//! # minidb-wal
//!
//! Append-only redo log. Every mutating table operation appends a full
//! post-image record *before* touching the data pages, which is what makes
//! crash recovery a straight replay of the log in file order.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod manager;
mod record;

pub use error::{WalError, WalResult};
pub use manager::LogManager;
pub use record::{LogOp, LogRecord};
