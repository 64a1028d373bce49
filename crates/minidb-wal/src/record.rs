//! Redo record line format.
//!
//! Each record is one UTF-8 line:
//!
//! ```text
//! <lsn>|<op>|<table>|<row_id>|<uppercase hex of data>\n
//! ```
//!
//! `data` is the full post-image of the record at `row_id`, so replaying a
//! record is idempotent. The parser splits naively on `|`; table names must
//! not contain that character.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use minidb_common::{Lsn, RowId};

/// The mutation kind a redo record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOp {
    /// A row was inserted; data is the new record.
    Insert,
    /// A row was overwritten; data is the record after the update.
    Update,
    /// A row was logically deleted; data is the record with its validity
    /// byte cleared.
    Delete,
}

impl LogOp {
    /// Returns the wire name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogOp::Insert => "INSERT",
            LogOp::Update => "UPDATE",
            LogOp::Delete => "DELETE",
        }
    }
}

impl fmt::Display for LogOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(LogOp::Insert),
            "UPDATE" => Ok(LogOp::Update),
            "DELETE" => Ok(LogOp::Delete),
            _ => Err(()),
        }
    }
}

/// One redo record: LSN, operation, table, row, and full post-image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Sequence number assigned at append time.
    pub lsn: Lsn,
    /// Mutation kind.
    pub op: LogOp,
    /// Lowercased table name.
    pub table: String,
    /// Slot the post-image belongs to.
    pub row_id: RowId,
    /// Full record bytes after the mutation.
    pub data: Bytes,
}

impl LogRecord {
    /// Renders the record as its log line, without the trailing newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.lsn,
            self.op,
            self.table,
            self.row_id,
            encode_hex(&self.data)
        )
    }

    /// Parses one log line; returns `None` for malformed input.
    ///
    /// Recovery skips malformed lines rather than failing, so a torn tail
    /// write cannot wedge the database on reopen.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return None;
        }
        let mut parts = line.splitn(5, '|');
        let lsn = parts.next()?.parse::<u64>().ok()?;
        let op = parts.next()?.parse::<LogOp>().ok()?;
        let table = parts.next()?;
        let row_id = parts.next()?.parse::<u64>().ok()?;
        let data = decode_hex(parts.next()?)?;
        Some(Self {
            lsn: Lsn::new(lsn),
            op,
            table: table.to_string(),
            row_id: RowId::new(row_id),
            data: Bytes::from(data),
        })
    }
}

/// Encodes bytes as uppercase hex, two characters per byte.
#[must_use]
pub fn encode_hex(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Decodes a hex string; `None` on odd length or non-hex characters.
#[must_use]
pub fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let bytes = hex.as_bytes();
    let mut out = Vec::with_capacity(hex.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let high = (pair[0] as char).to_digit(16)?;
        let low = (pair[1] as char).to_digit(16)?;
        out.push(((high << 4) | low) as u8);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LogRecord {
        LogRecord {
            lsn: Lsn::new(7),
            op: LogOp::Update,
            table: "users".to_string(),
            row_id: RowId::new(3),
            data: Bytes::from_static(&[0x01, 0xAB, 0x00, 0xFF]),
        }
    }

    #[test]
    fn line_round_trip() {
        let record = sample();
        let line = record.to_line();
        assert_eq!(line, "7|UPDATE|users|3|01AB00FF");
        assert_eq!(LogRecord::parse_line(&line).unwrap(), record);
    }

    #[test]
    fn hex_is_uppercase() {
        assert_eq!(encode_hex(&[0xDE, 0xAD, 0x0E]), "DEAD0E");
        assert_eq!(decode_hex("DEAD0E").unwrap(), vec![0xDE, 0xAD, 0x0E]);
        // Lowercase input still decodes.
        assert_eq!(decode_hex("dead0e").unwrap(), vec![0xDE, 0xAD, 0x0E]);
    }

    #[test]
    fn malformed_lines_yield_none() {
        assert!(LogRecord::parse_line("").is_none());
        assert!(LogRecord::parse_line("not a record").is_none());
        assert!(LogRecord::parse_line("x|INSERT|t|0|00").is_none());
        assert!(LogRecord::parse_line("1|TRUNCATE|t|0|00").is_none());
        assert!(LogRecord::parse_line("1|INSERT|t|zero|00").is_none());
        assert!(LogRecord::parse_line("1|INSERT|t|0|0").is_none());
        assert!(LogRecord::parse_line("1|INSERT|t|0|ZZ").is_none());
        assert!(LogRecord::parse_line("1|INSERT|t").is_none());
    }

    #[test]
    fn empty_data_is_valid() {
        let line = "1|DELETE|t|0|";
        let record = LogRecord::parse_line(line).unwrap();
        assert!(record.data.is_empty());
        assert_eq!(record.to_line(), line);
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let record = LogRecord::parse_line("7|UPDATE|users|3|01AB00FF\n").unwrap();
        assert_eq!(record, sample());
    }
}
