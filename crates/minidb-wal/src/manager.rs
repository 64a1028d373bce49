//! The log manager: mutexed appender over one text log file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use minidb_common::Lsn;

use crate::error::{WalError, WalResult};
use crate::record::{LogOp, LogRecord};

struct Appender {
    file: File,
    next_lsn: Lsn,
}

/// Append-only redo log with a monotonic LSN counter.
///
/// The counter starts at [`Lsn::FIRST`] on every construction, so LSNs are
/// monotonic within a process lifetime but not across restarts. Recovery
/// replays records in file order and never relies on cross-restart LSN
/// ordering.
///
/// Thread safety: one mutex covers the file handle and the counter, which
/// totally orders appends and makes LSNs monotonic in append order.
pub struct LogManager {
    path: PathBuf,
    appender: Mutex<Appender>,
}

impl LogManager {
    /// Opens (creating if necessary) the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| WalError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            appender: Mutex::new(Appender {
                file,
                next_lsn: Lsn::FIRST,
            }),
        })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and returns its LSN.
    ///
    /// The line is written and fdatasync'd before this returns, so the redo
    /// record is durable before the caller touches any data page.
    pub fn append(
        &self,
        op: LogOp,
        table: &str,
        row_id: minidb_common::RowId,
        data: &[u8],
    ) -> WalResult<Lsn> {
        let mut appender = self.appender.lock();
        let lsn = appender.next_lsn;
        let record = LogRecord {
            lsn,
            op,
            table: table.to_string(),
            row_id,
            data: bytes::Bytes::copy_from_slice(data),
        };
        let mut line = record.to_line();
        line.push('\n');

        appender
            .file
            .seek(SeekFrom::End(0))
            .map_err(|source| self.io_error(source))?;
        appender
            .file
            .write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))?;
        appender
            .file
            .sync_data()
            .map_err(|source| self.io_error(source))?;

        appender.next_lsn = lsn.next();
        Ok(lsn)
    }

    /// Reads every record in file order.
    ///
    /// Malformed lines (for example a torn tail from a crash mid-append)
    /// are skipped with a warning rather than failing recovery.
    pub fn read_all(&self) -> WalResult<Vec<LogRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            if line.trim().is_empty() {
                continue;
            }
            match LogRecord::parse_line(&line) {
                Some(record) => records.push(record),
                None => {
                    warn!(line = index + 1, path = %self.path.display(), "skipping malformed log line");
                }
            }
        }
        Ok(records)
    }

    /// Truncates the log file; called after a checkpoint.
    ///
    /// The LSN counter is left untouched so sequence numbers stay monotonic
    /// within this manager's lifetime.
    pub fn clear(&self) -> WalResult<()> {
        let appender = self.appender.lock();
        appender
            .file
            .set_len(0)
            .map_err(|source| self.io_error(source))?;
        appender
            .file
            .sync_data()
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> WalError {
        WalError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("path", &self.path)
            .finish()
    }
}
