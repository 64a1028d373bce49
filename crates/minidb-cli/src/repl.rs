//! Interactive shell: line editing, multi-line statement buffering, and
//! statement dispatch.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use minidb_engine::Database;
use minidb_sql::{parse, Executor};

use crate::formatter::format_result;

const PROMPT: &str = "minidb> ";
const CONTINUATION_PROMPT: &str = "....> ";

/// The interactive loop over an open database.
pub struct Repl {
    executor: Executor,
}

impl Repl {
    /// Creates a REPL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executor: Executor::new(),
        }
    }

    /// Parses and runs one statement, printing the result or error.
    pub fn execute_and_print(&self, db: &Database, sql: &str) {
        match parse(sql) {
            Ok(statement) => match self.executor.execute(statement, db) {
                Ok(result) => println!("{}", format_result(&result)),
                Err(e) => println!("Error: {e}"),
            },
            Err(e) => println!("Error: {e}"),
        }
    }

    /// Runs every `;`-terminated statement in `input`.
    ///
    /// The split is naive, matching the log and catalog formats: string
    /// literals must not contain semicolons.
    pub fn execute_script(&self, db: &Database, input: &str) {
        for sql in input.split(';') {
            let sql = sql.trim();
            if !sql.is_empty() {
                self.execute_and_print(db, sql);
            }
        }
    }

    /// Reads statements until EOF or `exit`/`quit`.
    pub fn run(&self, db: &Database) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        let mut buffer = String::new();

        loop {
            let prompt = if buffer.trim().is_empty() {
                PROMPT
            } else {
                CONTINUATION_PROMPT
            };
            let line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C abandons the statement in progress.
                    buffer.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };

            let trimmed = line.trim();
            if buffer.trim().is_empty() && (trimmed == "exit" || trimmed == "quit") {
                break;
            }
            if !trimmed.is_empty() {
                let _ = editor.add_history_entry(trimmed);
            }
            buffer.push_str(&line);
            buffer.push(' ');

            while let Some(pos) = buffer.find(';') {
                let sql = buffer[..pos].trim().to_string();
                buffer = buffer[pos + 1..].to_string();
                if !sql.is_empty() {
                    self.execute_and_print(db, &sql);
                }
            }
        }
        Ok(())
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
