//! The persistent table catalog.
//!
//! One line per table: `<name>|<col>:<TYPE>[|…]` where TYPE is `INT` or
//! `TEXT(<n>)`. Table names are stored lowercased. The whole file is
//! rewritten on every DDL change.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use minidb_common::constants::DEFAULT_TEXT_LENGTH;

use crate::error::{DbError, DbResult};
use crate::schema::{Column, Schema};
use crate::value::ColumnType;

/// In-memory table-name → schema map backed by a text file.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    schemas: HashMap<String, Schema>,
}

impl Catalog {
    /// Creates a catalog over `path` without touching the filesystem.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schemas: HashMap::new(),
        }
    }

    /// Loads the catalog file; a missing file is an empty catalog.
    pub fn load(&mut self) -> DbResult<()> {
        self.schemas.clear();
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(DbError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split('|');
            let Some(table) = parts.next() else {
                continue;
            };
            let table = table.trim().to_lowercase();
            let mut columns = Vec::new();
            for part in parts {
                let part = part.trim();
                let Some((name, ty)) = part.split_once(':') else {
                    continue;
                };
                columns.push(parse_column(name.trim(), ty.trim())?);
            }
            if table.is_empty() || columns.is_empty() {
                continue;
            }
            self.schemas.insert(table, Schema::new(columns));
        }
        Ok(())
    }

    /// Rewrites the catalog file from the in-memory map.
    pub fn save(&self) -> DbResult<()> {
        let mut out = String::new();
        let mut names: Vec<&String> = self.schemas.keys().collect();
        names.sort();
        for name in names {
            out.push_str(name);
            for column in self.schemas[name].columns() {
                let _ = write!(out, "|{}:{}", column.name, format_column_type(column));
            }
            out.push('\n');
        }
        std::fs::write(&self.path, out).map_err(|source| DbError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Registers a new table and persists the catalog.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> DbResult<()> {
        let key = name.to_lowercase();
        if self.schemas.contains_key(&key) {
            return Err(DbError::TableExists {
                name: name.to_string(),
            });
        }
        self.schemas.insert(key, schema);
        self.save()
    }

    /// Removes a table and persists the catalog.
    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        let key = name.to_lowercase();
        if self.schemas.remove(&key).is_none() {
            return Err(DbError::TableNotFound {
                name: name.to_string(),
            });
        }
        self.save()
    }

    /// Appends a column to a table's schema and persists the catalog.
    pub fn alter_add_column(&mut self, name: &str, column: Column) -> DbResult<()> {
        let key = name.to_lowercase();
        let Some(schema) = self.schemas.get(&key) else {
            return Err(DbError::TableNotFound {
                name: name.to_string(),
            });
        };
        if schema.column_index(&column.name).is_some() {
            return Err(DbError::ColumnExists {
                table: name.to_string(),
                column: column.name,
            });
        }
        let mut columns = schema.columns().to_vec();
        columns.push(column);
        self.schemas.insert(key, Schema::new(columns));
        self.save()
    }

    /// Looks up a table's schema.
    #[must_use]
    pub fn get_schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(&name.to_lowercase())
    }

    /// Returns all table names, sorted.
    #[must_use]
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Parses a `col:TYPE` type description, e.g. `INT` or `TEXT(32)`.
fn parse_column(name: &str, ty: &str) -> DbResult<Column> {
    let upper = ty.to_uppercase();
    if upper == "INT" {
        return Ok(Column::int(name));
    }
    if let Some(rest) = upper.strip_prefix("TEXT") {
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(Column::text(name, DEFAULT_TEXT_LENGTH));
        }
        if let Some(length) = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .and_then(|r| r.trim().parse::<u32>().ok())
        {
            return Ok(Column::text(name, length));
        }
    }
    Err(DbError::InvalidValue {
        column: name.to_string(),
        reason: format!("unknown column type: {ty}"),
    })
}

/// Formats a column type for the catalog file.
fn format_column_type(column: &Column) -> String {
    match column.ty {
        ColumnType::Int => "INT".to_string(),
        ColumnType::Text => format!("TEXT({})", column.length),
    }
}
