//! # minidb-common
//!
//! Common types, configuration, and memory utilities for minidb.
//!
//! This crate provides the foundational pieces used across all minidb
//! components:
//!
//! - **Types**: core identifiers (`PageId`, `RowId`, `Lsn`)
//! - **Config**: database and NUMA configuration structures
//! - **Constants**: system-wide constants and file-format parameters
//! - **Memory**: aligned page buffers and the NUMA topology/allocator
//!   capability traits with platform and fallback implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod memory;
pub mod types;

pub use config::{ConfigError, DatabaseConfig, NumaOptions};
pub use types::{Lsn, PageId, RowId};
