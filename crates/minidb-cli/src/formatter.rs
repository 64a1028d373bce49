//! Plain-text rendering of statement results.

use std::fmt::Write as _;

use minidb_sql::StatementResult;

/// Renders a statement result for the terminal.
///
/// SELECT output is a tab-separated header line, one line per row, and a
/// `Rows: n` footer.
#[must_use]
pub fn format_result(result: &StatementResult) -> String {
    match result {
        StatementResult::Ok => "OK".to_string(),
        StatementResult::Inserted(row_id) => format!("Inserted row {row_id}"),
        StatementResult::Updated(count) => format!("Updated {count} rows"),
        StatementResult::Deleted(count) => format!("Deleted {count} rows"),
        StatementResult::Rows { columns, rows } => {
            let mut out = String::new();
            out.push_str(&columns.join("\t"));
            out.push('\n');
            for row in rows {
                let mut first = true;
                for value in row {
                    if !first {
                        out.push('\t');
                    }
                    let _ = write!(out, "{value}");
                    first = false;
                }
                out.push('\n');
            }
            let _ = write!(out, "Rows: {}", rows.len());
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minidb_common::RowId;
    use minidb_engine::Value;

    #[test]
    fn scalar_results() {
        assert_eq!(format_result(&StatementResult::Ok), "OK");
        assert_eq!(
            format_result(&StatementResult::Inserted(RowId::new(3))),
            "Inserted row 3"
        );
        assert_eq!(format_result(&StatementResult::Updated(2)), "Updated 2 rows");
        assert_eq!(format_result(&StatementResult::Deleted(0)), "Deleted 0 rows");
    }

    #[test]
    fn row_results_are_tab_separated() {
        let result = StatementResult::Rows {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Value::int(1), Value::text("a")],
                vec![Value::int(2), Value::text("b")],
            ],
        };
        assert_eq!(format_result(&result), "id\tname\n1\ta\n2\tb\nRows: 2");
    }

    #[test]
    fn empty_result_set_keeps_header() {
        let result = StatementResult::Rows {
            columns: vec!["id".to_string()],
            rows: vec![],
        };
        assert_eq!(format_result(&result), "id\nRows: 0");
    }
}
