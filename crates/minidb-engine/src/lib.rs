//! # minidb-engine
//!
//! The relational core of minidb: fixed-schema tables stored as paged
//! record heaps, a persistent catalog, redo-log recovery, and a
//! NUMA-bound worker pool that routes row operations to the node owning
//! the backing page.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod catalog;
mod database;
mod error;
mod schema;
mod table;
mod value;
mod worker;

pub use catalog::Catalog;
pub use database::Database;
pub use error::{DbError, DbResult};
pub use schema::{Column, Schema};
pub use table::TableStorage;
pub use value::{ColumnType, Condition, SetClause, Value};
pub use worker::{NumaWorkerPool, TaskHandle};
