//! Statement execution against a [`Database`].

use minidb_common::RowId;
use minidb_engine::{Database, DbResult, Value};

use crate::statement::Statement;

/// The typed outcome of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    /// A DDL statement completed.
    Ok,
    /// INSERT stored a row at this id.
    Inserted(RowId),
    /// SELECT produced these rows.
    Rows {
        /// Column names, in schema order.
        columns: Vec<String>,
        /// Decoded rows in scan order.
        rows: Vec<Vec<Value>>,
    },
    /// UPDATE rewrote this many rows.
    Updated(usize),
    /// DELETE removed this many rows.
    Deleted(usize),
}

/// Maps parsed statements onto the database API.
#[derive(Debug, Default)]
pub struct Executor;

impl Executor {
    /// Creates an executor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Executes one statement.
    pub fn execute(&self, statement: Statement, db: &Database) -> DbResult<StatementResult> {
        match statement {
            Statement::CreateTable { table, columns } => {
                db.create_table(&table, columns)?;
                Ok(StatementResult::Ok)
            }
            Statement::DropTable { table } => {
                db.drop_table(&table)?;
                Ok(StatementResult::Ok)
            }
            Statement::AlterAddColumn { table, column } => {
                db.alter_add_column(&table, column)?;
                Ok(StatementResult::Ok)
            }
            Statement::Insert { table, values } => {
                let row_id = db.insert(&table, values)?;
                Ok(StatementResult::Inserted(row_id))
            }
            Statement::Select { table, filter } => {
                let rows = db.select(&table, filter.as_ref())?;
                let columns = db
                    .get_schema(&table)?
                    .columns()
                    .iter()
                    .map(|column| column.name.clone())
                    .collect();
                Ok(StatementResult::Rows { columns, rows })
            }
            Statement::Update {
                table,
                sets,
                filter,
            } => {
                let updated = db.update(&table, &sets, filter.as_ref())?;
                Ok(StatementResult::Updated(updated))
            }
            Statement::Delete { table, filter } => {
                let deleted = db.remove(&table, filter.as_ref())?;
                Ok(StatementResult::Deleted(deleted))
            }
        }
    }
}
