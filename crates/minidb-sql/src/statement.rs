//! Parsed statements.

use minidb_engine::{Column, Condition, SetClause, Value};

/// One parsed SQL statement, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE <table> (<col> <TYPE>, …)`
    CreateTable {
        /// Target table name.
        table: String,
        /// Column definitions in declaration order.
        columns: Vec<Column>,
    },
    /// `DROP TABLE <table>`
    DropTable {
        /// Target table name.
        table: String,
    },
    /// `ALTER TABLE <table> ADD [COLUMN] <col> <TYPE>`
    AlterAddColumn {
        /// Target table name.
        table: String,
        /// The column being added.
        column: Column,
    },
    /// `INSERT INTO <table> VALUES (<v>, …)`
    Insert {
        /// Target table name.
        table: String,
        /// Literal values in column order.
        values: Vec<Value>,
    },
    /// `SELECT * FROM <table> [WHERE <col> = <v>]`
    Select {
        /// Target table name.
        table: String,
        /// Optional equality predicate.
        filter: Option<Condition>,
    },
    /// `UPDATE <table> SET <col> = <v> [, …] [WHERE <col> = <v>]`
    Update {
        /// Target table name.
        table: String,
        /// Assignments to apply to matching rows.
        sets: Vec<SetClause>,
        /// Optional equality predicate.
        filter: Option<Condition>,
    },
    /// `DELETE FROM <table> [WHERE <col> = <v>]`
    Delete {
        /// Target table name.
        table: String,
        /// Optional equality predicate.
        filter: Option<Condition>,
    },
}
