//! # minidb-sql
//!
//! The SQL-ish text surface of minidb: a tokenizer, a recursive-descent
//! parser producing [`Statement`] values, and an [`Executor`] that maps
//! statements onto the [`minidb_engine::Database`] API.
//!
//! The dialect is deliberately small: CREATE/DROP/ALTER TABLE, INSERT,
//! SELECT `*`, UPDATE, and DELETE, with single-column equality WHERE
//! clauses and `INT` / `TEXT(n)` column types.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod executor;
mod parser;
mod statement;

pub use executor::{Executor, StatementResult};
pub use parser::{parse, ParseError};
pub use statement::Statement;
