//! Table schemas and the fixed-length record codec.
//!
//! On-disk record layout: `[valid:1][col_0][col_1]…`. INT columns occupy
//! exactly 4 bytes little-endian; TEXT(n) columns occupy exactly n bytes,
//! NUL-padded, decoded by truncating at the first NUL. `record_size` is
//! `1 + sum(column sizes)` and must fit one page.

use std::collections::HashMap;

use crate::error::{DbError, DbResult};
use crate::value::{ColumnType, Value};

/// A column definition: name, type, and fixed TEXT length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name; looked up case-insensitively.
    pub name: String,
    /// Stored type.
    pub ty: ColumnType,
    /// Fixed byte length for TEXT columns; ignored for INT.
    pub length: u32,
}

impl Column {
    /// Creates an INT column.
    pub fn int(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::Int,
            length: 0,
        }
    }

    /// Creates a TEXT column with a fixed byte length.
    pub fn text(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::Text,
            length,
        }
    }

    /// Returns the column's on-disk size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        match self.ty {
            ColumnType::Int => 4,
            ColumnType::Text => self.length as usize,
        }
    }
}

/// An ordered column list with a case-insensitive name index.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema over the given columns.
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, col)| (col.name.to_lowercase(), i))
            .collect();
        Self { columns, index }
    }

    /// Returns the columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the payload size (everything after the validity byte).
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.columns.iter().map(Column::size).sum()
    }

    /// Returns the full record size including the validity byte.
    #[must_use]
    pub fn record_size(&self) -> usize {
        1 + self.data_size()
    }

    /// Finds a column by name, case-insensitively.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    /// Coerces `value` to the type of column `index`.
    ///
    /// INT columns accept Int directly, or Text that parses as a decimal
    /// integer within i32 range. TEXT columns accept Text within the column
    /// length, or Int formatted as decimal if it fits. Anything else fails.
    pub fn normalize_value(&self, index: usize, value: Value) -> DbResult<Value> {
        let Some(column) = self.columns.get(index) else {
            return Err(DbError::UnknownColumn {
                name: format!("#{index}"),
            });
        };
        match (column.ty, value) {
            (ColumnType::Int, Value::Int(v)) => Ok(Value::Int(v)),
            (ColumnType::Int, Value::Text(text)) => {
                let parsed: i64 = text.trim().parse().map_err(|_| DbError::InvalidValue {
                    column: column.name.clone(),
                    reason: format!("expected INT, got {text:?}"),
                })?;
                let v = i32::try_from(parsed).map_err(|_| DbError::InvalidValue {
                    column: column.name.clone(),
                    reason: format!("INT value {parsed} out of range"),
                })?;
                Ok(Value::Int(v))
            }
            (ColumnType::Text, value) => {
                let text = match value {
                    Value::Text(text) => text,
                    Value::Int(v) => v.to_string(),
                };
                if column.length > 0 && text.len() > column.length as usize {
                    return Err(DbError::InvalidValue {
                        column: column.name.clone(),
                        reason: format!(
                            "TEXT value of {} bytes exceeds column length {}",
                            text.len(),
                            column.length
                        ),
                    });
                }
                Ok(Value::Text(text))
            }
        }
    }

    /// Checks the value count and coerces every value to its column type.
    pub fn validate_values(&self, values: Vec<Value>) -> DbResult<Vec<Value>> {
        if values.len() != self.columns.len() {
            return Err(DbError::ValueCountMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| self.normalize_value(i, value))
            .collect()
    }

    /// Encodes values into a fixed-length record with the given validity.
    pub fn encode_record(&self, values: &[Value], valid: bool) -> DbResult<Vec<u8>> {
        let values = self.validate_values(values.to_vec())?;
        let mut record = vec![0u8; self.record_size()];
        record[0] = u8::from(valid);
        let mut offset = 1;
        for (column, value) in self.columns.iter().zip(&values) {
            match (column.ty, value) {
                (ColumnType::Int, Value::Int(v)) => {
                    record[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
                }
                (ColumnType::Text, Value::Text(text)) => {
                    let bytes = text.as_bytes();
                    record[offset..offset + bytes.len()].copy_from_slice(bytes);
                    // The remainder of the slot stays NUL.
                }
                // validate_values already matched value types to columns.
                _ => {
                    return Err(DbError::InvalidValue {
                        column: column.name.clone(),
                        reason: "value type does not match column".to_string(),
                    })
                }
            }
            offset += column.size();
        }
        Ok(record)
    }

    /// Decodes a record into its values and validity flag.
    pub fn decode_record(&self, record: &[u8]) -> DbResult<(Vec<Value>, bool)> {
        if record.len() < self.record_size() {
            return Err(DbError::RedoSizeMismatch {
                expected: self.record_size(),
                actual: record.len(),
            });
        }
        let valid = record[0] != 0;
        let mut values = Vec::with_capacity(self.columns.len());
        let mut offset = 1;
        for column in &self.columns {
            match column.ty {
                ColumnType::Int => {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(&record[offset..offset + 4]);
                    values.push(Value::Int(i32::from_le_bytes(raw)));
                }
                ColumnType::Text => {
                    let slot = &record[offset..offset + column.length as usize];
                    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
                    values.push(Value::Text(
                        String::from_utf8_lossy(&slot[..end]).into_owned(),
                    ));
                }
            }
            offset += column.size();
        }
        Ok((values, valid))
    }

    /// Reads only the validity byte of a record.
    pub fn record_is_valid(&self, record: &[u8]) -> DbResult<bool> {
        if record.len() < self.record_size() {
            return Err(DbError::RedoSizeMismatch {
                expected: self.record_size(),
                actual: record.len(),
            });
        }
        Ok(record[0] != 0)
    }

    /// Returns the per-type defaults used for added columns: INT 0, TEXT "".
    #[must_use]
    pub fn default_values(&self) -> Vec<Value> {
        self.columns
            .iter()
            .map(|column| match column.ty {
                ColumnType::Int => Value::Int(0),
                ColumnType::Text => Value::Text(String::new()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![Column::int("id"), Column::text("name", 8)])
    }

    #[test]
    fn record_size_counts_validity_byte() {
        let schema = sample();
        assert_eq!(schema.data_size(), 12);
        assert_eq!(schema.record_size(), 13);
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let schema = sample();
        assert_eq!(schema.column_index("ID"), Some(0));
        assert_eq!(schema.column_index("Name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
    }

    #[test]
    fn encode_decode_round_trip() {
        let schema = sample();
        let values = vec![Value::int(42), Value::text("ab")];
        let record = schema.encode_record(&values, true).unwrap();
        assert_eq!(record.len(), schema.record_size());
        assert_eq!(record[0], 1);

        let (decoded, valid) = schema.decode_record(&record).unwrap();
        assert!(valid);
        assert_eq!(decoded, values);
    }

    #[test]
    fn invalid_records_keep_their_payload() {
        let schema = sample();
        let record = schema
            .encode_record(&[Value::int(1), Value::text("gone")], false)
            .unwrap();
        let (decoded, valid) = schema.decode_record(&record).unwrap();
        assert!(!valid);
        assert_eq!(decoded[1], Value::text("gone"));
    }

    #[test]
    fn text_decodes_up_to_first_nul() {
        let schema = sample();
        let mut record = schema
            .encode_record(&[Value::int(0), Value::text("abc")], true)
            .unwrap();
        // Bytes after an embedded NUL are invisible.
        record[5 + 1] = 0; // second byte of the text slot
        let (decoded, _) = schema.decode_record(&record).unwrap();
        assert_eq!(decoded[1], Value::text("a"));
    }

    #[test]
    fn int_column_coerces_numeric_text() {
        let schema = sample();
        assert_eq!(
            schema.normalize_value(0, Value::text("123")).unwrap(),
            Value::int(123)
        );
        assert_eq!(
            schema.normalize_value(0, Value::text("-7")).unwrap(),
            Value::int(-7)
        );
        assert!(schema.normalize_value(0, Value::text("abc")).is_err());
        assert!(schema
            .normalize_value(0, Value::text("99999999999"))
            .is_err());
    }

    #[test]
    fn text_column_coerces_ints_and_enforces_length() {
        let schema = sample();
        assert_eq!(
            schema.normalize_value(1, Value::int(12)).unwrap(),
            Value::text("12")
        );
        assert!(schema.normalize_value(1, Value::text("123456789")).is_err());
        // -123456789 needs 10 bytes, over the 8-byte column.
        assert!(schema.normalize_value(1, Value::int(-123_456_789)).is_err());
    }

    #[test]
    fn value_count_must_match() {
        let schema = sample();
        assert!(matches!(
            schema.validate_values(vec![Value::int(1)]),
            Err(DbError::ValueCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn short_record_is_rejected() {
        let schema = sample();
        assert!(schema.decode_record(&[1, 2, 3]).is_err());
        assert!(schema.record_is_valid(&[]).is_err());
    }

    #[test]
    fn defaults_per_type() {
        let schema = sample();
        assert_eq!(
            schema.default_values(),
            vec![Value::int(0), Value::text("")]
        );
    }
}
