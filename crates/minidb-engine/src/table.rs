//! Fixed-length record heap for one table.
//!
//! Layout: page 0 holds the 32-byte header (`TBL1` magic, record size, row
//! count); records start at byte offset `page_size` and occupy contiguous
//! fixed slots, so slot `i` lives at `page_size + i * record_size`. A slot
//! is logically deleted iff its validity byte is 0; deleted slots go on a
//! LIFO free list and are reused by inserts.
//!
//! Locking discipline:
//!
//! - `core` (`RwLock`): schema-level coordination. Row operations hold it
//!   shared; `rebuild_for_schema` holds it exclusively while it swaps the
//!   file and schema.
//! - `meta` (`Mutex`): row count, free list, and header writes.
//! - `page_locks` (64 striped mutexes, `page_id % 64`): per-record I/O.
//!   Point operations hold one acquisition across their whole
//!   read-modify-write, which is what rules out lost updates on a row.
//!
//! A single call takes the table lock first and then *either* the meta
//! mutex or a page lock, never both at once.
//!
//! Bulk `select`/`update`/`remove` scans lock each record access but
//! nothing across the scan; they are single-writer by contract.
//!
//! Every mutation appends its full post-image to the redo log *before*
//! writing the data page.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use minidb_common::config::NumaOptions;
use minidb_common::constants::{PAGE_LOCK_STRIPES, TABLE_HEADER_SIZE, TABLE_MAGIC};
use minidb_common::{PageId, RowId};
use minidb_storage::PagedFile;
use minidb_wal::{LogManager, LogOp};

use crate::error::{DbError, DbResult};
use crate::schema::Schema;
use crate::value::{Condition, SetClause, Value};

struct TableCore {
    path: PathBuf,
    schema: Schema,
    file: PagedFile,
}

#[derive(Default)]
struct TableMeta {
    row_count: u64,
    /// Row ids of logically deleted slots; reused LIFO.
    free_list: Vec<u64>,
}

/// Heap of fixed-length records with a free list and striped page locks.
pub struct TableStorage {
    name: String,
    page_size: usize,
    cache_pages: usize,
    numa_nodes: usize,
    numa: NumaOptions,
    log: Option<Arc<LogManager>>,
    core: RwLock<TableCore>,
    meta: Mutex<TableMeta>,
    page_locks: Vec<Mutex<()>>,
}

impl TableStorage {
    /// Creates the storage over `path` without reading the file; call
    /// [`TableStorage::load`] before using it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: impl AsRef<Path>,
        name: impl Into<String>,
        schema: Schema,
        page_size: usize,
        cache_pages: usize,
        numa_nodes: usize,
        numa: NumaOptions,
        log: Option<Arc<LogManager>>,
    ) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = PagedFile::open(&path, page_size, cache_pages, numa_nodes, numa.clone())?;
        Ok(Self {
            name: name.into(),
            page_size,
            cache_pages,
            numa_nodes,
            numa,
            log,
            core: RwLock::new(TableCore { path, schema, file }),
            meta: Mutex::new(TableMeta::default()),
            page_locks: (0..PAGE_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    /// Loads the header (writing a fresh one into an empty file) and
    /// rebuilds the free list.
    pub fn load(&self) -> DbResult<()> {
        let core = self.core.read();
        let record_size = core.schema.record_size();
        if record_size > self.page_size {
            return Err(DbError::RecordTooLarge {
                record_size,
                page_size: self.page_size,
            });
        }
        if core.file.file_size() == 0 {
            self.meta.lock().row_count = 0;
            return self.store_header(&core);
        }
        let row_count = self.read_header(&core)?;
        {
            let mut meta = self.meta.lock();
            meta.row_count = row_count;
        }
        self.rebuild_free_list_inner(&core)
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a snapshot of the schema.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.core.read().schema.clone()
    }

    /// Returns the slot count, including logically deleted slots.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.meta.lock().row_count
    }

    /// Returns the page holding the first byte of the given row.
    #[must_use]
    pub fn page_id_for_row(&self, row_id: RowId) -> PageId {
        let core = self.core.read();
        let offset = self.record_offset(&core.schema, row_id.as_u64());
        PageId::containing(offset, self.page_size)
    }

    /// Returns the NUMA node that caches the given row's page.
    #[must_use]
    pub fn node_for_row(&self, row_id: RowId) -> usize {
        let core = self.core.read();
        let offset = self.record_offset(&core.schema, row_id.as_u64());
        core.file.node_for_page(PageId::containing(offset, self.page_size))
    }

    /// Returns the resident cache pages per NUMA node.
    #[must_use]
    pub fn cached_pages_per_node(&self) -> Vec<usize> {
        self.core.read().file.cached_pages_per_node()
    }

    /// Returns the number of NUMA shards backing this table.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.core.read().file.node_count()
    }

    // =========================================================================
    // Bulk operations (scan-based)
    // =========================================================================

    /// Inserts a row, reusing a free slot when one exists.
    ///
    /// Returns the row id. The header is rewritten only when the row count
    /// grew.
    pub fn insert(&self, values: Vec<Value>) -> DbResult<RowId> {
        let core = self.core.read();
        let record = core.schema.encode_record(&values, true)?;

        let (row_id, appended) = {
            let mut meta = self.meta.lock();
            match meta.free_list.pop() {
                Some(row_id) => (row_id, false),
                None => {
                    let row_id = meta.row_count;
                    meta.row_count += 1;
                    (row_id, true)
                }
            }
        };

        {
            let _slot = self.lock_row(&core.schema, row_id);
            self.append_redo(LogOp::Insert, row_id, &record)?;
            self.write_record(&core, row_id, &record)?;
        }

        if appended {
            self.store_header(&core)?;
        }
        Ok(RowId::new(row_id))
    }

    /// Full scan returning decoded rows that match the filter.
    pub fn select(&self, filter: Option<&Condition>) -> DbResult<Vec<Vec<Value>>> {
        let core = self.core.read();
        let filter = self.resolve_filter(&core.schema, filter)?;
        let row_count = self.meta.lock().row_count;

        let mut rows = Vec::new();
        for row_id in 0..row_count {
            let record = {
                let _slot = self.lock_row(&core.schema, row_id);
                self.read_record(&core, row_id)?
            };
            let (values, valid) = core.schema.decode_record(&record)?;
            if !valid {
                continue;
            }
            if let Some((index, expected)) = &filter {
                if &values[*index] != expected {
                    continue;
                }
            }
            rows.push(values);
        }
        Ok(rows)
    }

    /// Scan-based update; returns the number of rows rewritten.
    pub fn update(&self, sets: &[SetClause], filter: Option<&Condition>) -> DbResult<usize> {
        if sets.is_empty() {
            return Err(DbError::EmptyUpdate);
        }
        let core = self.core.read();
        let sets = self.resolve_sets(&core.schema, sets)?;
        let filter = self.resolve_filter(&core.schema, filter)?;
        let row_count = self.meta.lock().row_count;

        let mut updated = 0;
        for row_id in 0..row_count {
            let _slot = self.lock_row(&core.schema, row_id);
            let record = self.read_record(&core, row_id)?;
            let (mut values, valid) = core.schema.decode_record(&record)?;
            if !valid {
                continue;
            }
            if let Some((index, expected)) = &filter {
                if &values[*index] != expected {
                    continue;
                }
            }
            for (index, value) in &sets {
                values[*index] = value.clone();
            }
            let record = core.schema.encode_record(&values, true)?;
            self.append_redo(LogOp::Update, row_id, &record)?;
            self.write_record(&core, row_id, &record)?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Scan-based logical delete; returns the number of rows removed.
    pub fn remove(&self, filter: Option<&Condition>) -> DbResult<usize> {
        let core = self.core.read();
        let filter = self.resolve_filter(&core.schema, filter)?;
        let row_count = self.meta.lock().row_count;

        let mut removed = 0;
        for row_id in 0..row_count {
            let matched = {
                let _slot = self.lock_row(&core.schema, row_id);
                let mut record = self.read_record(&core, row_id)?;
                let (values, valid) = core.schema.decode_record(&record)?;
                let matched = valid
                    && match &filter {
                        Some((index, expected)) => &values[*index] == expected,
                        None => true,
                    };
                if matched {
                    record[0] = 0;
                    self.append_redo(LogOp::Delete, row_id, &record)?;
                    self.write_record(&core, row_id, &record)?;
                }
                matched
            };
            if matched {
                self.meta.lock().free_list.push(row_id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    // =========================================================================
    // Point operations (row-id addressed, used by the worker executor)
    // =========================================================================

    /// Reads one row; returns its values and validity flag.
    pub fn read_row(&self, row_id: RowId) -> DbResult<(Vec<Value>, bool)> {
        let core = self.core.read();
        self.check_row(row_id)?;
        let record = {
            let _slot = self.lock_row(&core.schema, row_id.as_u64());
            self.read_record(&core, row_id.as_u64())?
        };
        core.schema.decode_record(&record)
    }

    /// Applies SET clauses to one live row.
    ///
    /// The whole read-modify-write happens under a single page-lock
    /// acquisition, so concurrent updates to the same row serialize.
    pub fn update_row(&self, row_id: RowId, sets: &[SetClause]) -> DbResult<()> {
        let core = self.core.read();
        self.check_row(row_id)?;
        let sets = self.resolve_sets(&core.schema, sets)?;

        let _slot = self.lock_row(&core.schema, row_id.as_u64());
        let record = self.read_record(&core, row_id.as_u64())?;
        let (mut values, valid) = core.schema.decode_record(&record)?;
        if !valid {
            return Err(DbError::RowNotFound { row_id });
        }
        for (index, value) in &sets {
            values[*index] = value.clone();
        }
        let record = core.schema.encode_record(&values, true)?;
        self.append_redo(LogOp::Update, row_id.as_u64(), &record)?;
        self.write_record(&core, row_id.as_u64(), &record)
    }

    /// Logically deletes one live row and frees its slot.
    pub fn delete_row(&self, row_id: RowId) -> DbResult<()> {
        let core = self.core.read();
        self.check_row(row_id)?;
        {
            let _slot = self.lock_row(&core.schema, row_id.as_u64());
            let mut record = self.read_record(&core, row_id.as_u64())?;
            if !core.schema.record_is_valid(&record)? {
                return Err(DbError::RowNotFound { row_id });
            }
            record[0] = 0;
            self.append_redo(LogOp::Delete, row_id.as_u64(), &record)?;
            self.write_record(&core, row_id.as_u64(), &record)?;
        }
        self.meta.lock().free_list.push(row_id.as_u64());
        Ok(())
    }

    /// Overwrites one existing slot with the given values and validity.
    pub fn write_row(&self, row_id: RowId, values: &[Value], valid: bool) -> DbResult<()> {
        let core = self.core.read();
        self.check_row(row_id)?;
        let record = core.schema.encode_record(values, valid)?;
        let op = if valid { LogOp::Update } else { LogOp::Delete };

        let _slot = self.lock_row(&core.schema, row_id.as_u64());
        self.append_redo(op, row_id.as_u64(), &record)?;
        self.write_record(&core, row_id.as_u64(), &record)
    }

    // =========================================================================
    // Recovery and maintenance
    // =========================================================================

    /// Applies a redo post-image verbatim, growing the heap if needed.
    ///
    /// Used only by recovery; does not re-validate values or touch the
    /// free list. Call [`TableStorage::rebuild_free_list`] after replay.
    pub fn apply_redo(&self, row_id: RowId, record: &[u8]) -> DbResult<()> {
        let core = self.core.read();
        let record_size = core.schema.record_size();
        if record.len() != record_size {
            return Err(DbError::RedoSizeMismatch {
                expected: record_size,
                actual: record.len(),
            });
        }
        let grew = {
            let mut meta = self.meta.lock();
            if row_id.as_u64() >= meta.row_count {
                meta.row_count = row_id.as_u64() + 1;
                true
            } else {
                false
            }
        };
        if grew {
            self.store_header(&core)?;
        }
        let _slot = self.lock_row(&core.schema, row_id.as_u64());
        self.write_record(&core, row_id.as_u64(), record)
    }

    /// Rescans the heap and rebuilds the free list from validity bytes.
    pub fn rebuild_free_list(&self) -> DbResult<()> {
        let core = self.core.read();
        self.rebuild_free_list_inner(&core)
    }

    /// Rewrites the table file for a new schema, mapping columns by name.
    ///
    /// Existing columns keep their values, missing ones get defaults
    /// (INT 0 / TEXT ""), and each row keeps its validity byte. The new
    /// file is built as `<path>.tmp`, then swapped in with a rename pair
    /// guarded by a `<path>.bak` backup. The rebuild writes no redo
    /// records; the caller checkpoints around it.
    pub fn rebuild_for_schema(&self, new_schema: Schema) -> DbResult<()> {
        let mut core = self.core.write();
        let new_record_size = new_schema.record_size();
        if new_record_size > self.page_size {
            return Err(DbError::RecordTooLarge {
                record_size: new_record_size,
                page_size: self.page_size,
            });
        }

        let tmp_path = append_extension(&core.path, "tmp");
        remove_stale(&tmp_path);
        let temp = TableStorage::new(
            &tmp_path,
            self.name.clone(),
            new_schema.clone(),
            self.page_size,
            self.cache_pages,
            self.numa_nodes,
            self.numa.clone(),
            None,
        )?;
        temp.load()?;

        let row_count = self.meta.lock().row_count;
        for row_id in 0..row_count {
            let record = self.read_record(&core, row_id)?;
            let (values, valid) = core.schema.decode_record(&record)?;
            let mapped: Vec<Value> = new_schema
                .columns()
                .iter()
                .enumerate()
                .map(|(new_index, column)| {
                    core.schema
                        .column_index(&column.name)
                        .and_then(|old_index| values.get(old_index).cloned())
                        .unwrap_or_else(|| new_schema.default_values()[new_index].clone())
                })
                .collect();
            let new_record = new_schema.encode_record(&mapped, valid)?;
            {
                let temp_core = temp.core.read();
                temp.write_record(&temp_core, row_id, &new_record)?;
            }
        }
        temp.meta.lock().row_count = row_count;
        {
            let temp_core = temp.core.read();
            temp.store_header(&temp_core)?;
            temp_core.file.flush()?;
        }
        drop(temp);

        let backup = append_extension(&core.path, "bak");
        remove_stale(&backup);
        std::fs::rename(&core.path, &backup).map_err(|source| DbError::Io {
            path: core.path.clone(),
            source,
        })?;
        if let Err(source) = std::fs::rename(&tmp_path, &core.path) {
            // Put the original file back before surfacing the error.
            if let Err(restore) = std::fs::rename(&backup, &core.path) {
                warn!(
                    path = %core.path.display(),
                    error = %restore,
                    "failed to restore table file from backup"
                );
            }
            return Err(DbError::Io {
                path: tmp_path,
                source,
            });
        }
        remove_stale(&backup);

        core.schema = new_schema;
        let path = core.path.clone();
        core.file.reset(&path)?;
        self.rebuild_free_list_inner(&core)
    }

    /// Writes all dirty pages back and syncs the file.
    pub fn flush(&self) -> DbResult<()> {
        let core = self.core.read();
        core.file.flush()?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn record_offset(&self, schema: &Schema, row_id: u64) -> u64 {
        self.page_size as u64 + row_id * schema.record_size() as u64
    }

    /// Locks the stripe of the page holding the row's first byte.
    fn lock_row(&self, schema: &Schema, row_id: u64) -> parking_lot::MutexGuard<'_, ()> {
        let page = PageId::containing(self.record_offset(schema, row_id), self.page_size);
        let stripe = (page.as_u64() % self.page_locks.len() as u64) as usize;
        self.page_locks[stripe].lock()
    }

    fn check_row(&self, row_id: RowId) -> DbResult<()> {
        if row_id.as_u64() >= self.meta.lock().row_count {
            return Err(DbError::RowNotFound { row_id });
        }
        Ok(())
    }

    fn read_record(&self, core: &TableCore, row_id: u64) -> DbResult<Vec<u8>> {
        let offset = self.record_offset(&core.schema, row_id);
        Ok(core.file.read_item(offset, core.schema.record_size())?)
    }

    fn write_record(&self, core: &TableCore, row_id: u64, record: &[u8]) -> DbResult<()> {
        let record_size = core.schema.record_size();
        if record.len() != record_size {
            return Err(DbError::RedoSizeMismatch {
                expected: record_size,
                actual: record.len(),
            });
        }
        let offset = self.record_offset(&core.schema, row_id);
        core.file.write_item(offset, record)?;
        Ok(())
    }

    fn append_redo(&self, op: LogOp, row_id: u64, record: &[u8]) -> DbResult<()> {
        if let Some(log) = &self.log {
            log.append(op, &self.name, RowId::new(row_id), record)?;
        }
        Ok(())
    }

    /// Writes the header from the current row count.
    fn store_header(&self, core: &TableCore) -> DbResult<()> {
        let row_count = self.meta.lock().row_count;
        let mut header = vec![0u8; TABLE_HEADER_SIZE];
        header[..4].copy_from_slice(&TABLE_MAGIC);
        header[4..8].copy_from_slice(&(core.schema.record_size() as u32).to_le_bytes());
        header[8..16].copy_from_slice(&row_count.to_le_bytes());
        core.file.write_item(0, &header)?;
        Ok(())
    }

    /// Reads and validates the header, returning the stored row count.
    fn read_header(&self, core: &TableCore) -> DbResult<u64> {
        let header = core.file.read_item(0, TABLE_HEADER_SIZE)?;
        if header[..4] != TABLE_MAGIC {
            return Err(DbError::Corrupt {
                path: core.path.clone(),
                reason: "bad magic".to_string(),
            });
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&header[4..8]);
        let stored = u32::from_le_bytes(raw) as usize;
        if stored != core.schema.record_size() {
            return Err(DbError::Corrupt {
                path: core.path.clone(),
                reason: format!(
                    "record size {stored} does not match schema record size {}",
                    core.schema.record_size()
                ),
            });
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&header[8..16]);
        Ok(u64::from_le_bytes(raw))
    }

    fn rebuild_free_list_inner(&self, core: &TableCore) -> DbResult<()> {
        let row_count = self.meta.lock().row_count;
        let mut free = Vec::new();
        for row_id in 0..row_count {
            let record = {
                let _slot = self.lock_row(&core.schema, row_id);
                self.read_record(core, row_id)?
            };
            if !core.schema.record_is_valid(&record)? {
                free.push(row_id);
            }
        }
        self.meta.lock().free_list = free;
        Ok(())
    }

    fn resolve_filter(
        &self,
        schema: &Schema,
        filter: Option<&Condition>,
    ) -> DbResult<Option<(usize, Value)>> {
        let Some(condition) = filter else {
            return Ok(None);
        };
        let index = schema
            .column_index(&condition.column)
            .ok_or_else(|| DbError::UnknownColumn {
                name: condition.column.clone(),
            })?;
        let value = schema.normalize_value(index, condition.value.clone())?;
        Ok(Some((index, value)))
    }

    fn resolve_sets(&self, schema: &Schema, sets: &[SetClause]) -> DbResult<Vec<(usize, Value)>> {
        sets.iter()
            .map(|set| {
                let index = schema
                    .column_index(&set.column)
                    .ok_or_else(|| DbError::UnknownColumn {
                        name: set.column.clone(),
                    })?;
                let value = schema.normalize_value(index, set.value.clone())?;
                Ok((index, value))
            })
            .collect()
    }
}

impl std::fmt::Debug for TableStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStorage")
            .field("name", &self.name)
            .field("row_count", &self.row_count())
            .finish()
    }
}

/// Returns `path` with `.ext` appended (keeping the original extension).
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Removes a leftover file, warning on anything but "not found".
fn remove_stale(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove stale file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use tempfile::tempdir;

    const PAGE: usize = 256;

    fn users_schema() -> Schema {
        Schema::new(vec![Column::int("id"), Column::text("name", 8)])
    }

    fn open_table(dir: &tempfile::TempDir, log: Option<Arc<LogManager>>) -> TableStorage {
        let table = TableStorage::new(
            dir.path().join("users.tbl"),
            "users",
            users_schema(),
            PAGE,
            8,
            1,
            NumaOptions::disabled(),
            log,
        )
        .unwrap();
        table.load().unwrap();
        table
    }

    fn row(id: i32, name: &str) -> Vec<Value> {
        vec![Value::int(id), Value::text(name)]
    }

    #[test]
    fn insert_select_round_trip() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);

        table.insert(row(1, "a")).unwrap();
        table.insert(row(2, "bb")).unwrap();
        table.insert(row(3, "ccc")).unwrap();

        let all = table.select(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], row(1, "a"));
        assert_eq!(all[2], row(3, "ccc"));

        let filtered = table
            .select(Some(&Condition::new("id", Value::int(2))))
            .unwrap();
        assert_eq!(filtered, vec![row(2, "bb")]);
    }

    #[test]
    fn header_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let table = open_table(&dir, None);
            table.insert(row(1, "a")).unwrap();
            table.insert(row(2, "b")).unwrap();
            table.flush().unwrap();
        }
        let table = open_table(&dir, None);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.select(None).unwrap().len(), 2);
    }

    #[test]
    fn reopen_with_wrong_schema_fails() {
        let dir = tempdir().unwrap();
        {
            let table = open_table(&dir, None);
            table.insert(row(1, "a")).unwrap();
            table.flush().unwrap();
        }
        let table = TableStorage::new(
            dir.path().join("users.tbl"),
            "users",
            Schema::new(vec![Column::int("id")]),
            PAGE,
            8,
            1,
            NumaOptions::disabled(),
            None,
        )
        .unwrap();
        assert!(matches!(table.load(), Err(DbError::Corrupt { .. })));
    }

    #[test]
    fn delete_frees_slot_and_insert_reuses_it() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);

        table.insert(row(1, "a")).unwrap();
        table.insert(row(2, "bb")).unwrap();
        table.insert(row(3, "ccc")).unwrap();

        let removed = table
            .remove(Some(&Condition::new("id", Value::int(2))))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(table.row_count(), 3);

        let reused = table.insert(row(4, "d")).unwrap();
        assert_eq!(reused, RowId::new(1));
        assert_eq!(table.row_count(), 3);

        let (values, valid) = table.read_row(RowId::new(1)).unwrap();
        assert!(valid);
        assert_eq!(values, row(4, "d"));
    }

    #[test]
    fn update_rewrites_matching_rows() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);

        table.insert(row(1, "a")).unwrap();
        table.insert(row(2, "b")).unwrap();
        table.insert(row(2, "c")).unwrap();

        let updated = table
            .update(
                &[SetClause::new("name", Value::text("z"))],
                Some(&Condition::new("id", Value::int(2))),
            )
            .unwrap();
        assert_eq!(updated, 2);

        let rows = table
            .select(Some(&Condition::new("name", Value::text("z"))))
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn filter_coerces_before_comparing() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);
        table.insert(row(7, "x")).unwrap();

        // Text "7" against an INT column matches after coercion.
        let rows = table
            .select(Some(&Condition::new("id", Value::text("7"))))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);
        table.insert(row(1, "a")).unwrap();

        assert!(matches!(
            table.select(Some(&Condition::new("ghost", Value::int(1)))),
            Err(DbError::UnknownColumn { .. })
        ));
        assert!(matches!(
            table.update(&[SetClause::new("ghost", Value::int(1))], None),
            Err(DbError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn point_ops_address_rows_directly() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);
        table.insert(row(1, "a")).unwrap();
        table.insert(row(2, "b")).unwrap();

        table
            .update_row(RowId::new(0), &[SetClause::new("name", Value::text("zz"))])
            .unwrap();
        let (values, valid) = table.read_row(RowId::new(0)).unwrap();
        assert!(valid);
        assert_eq!(values, row(1, "zz"));

        table.delete_row(RowId::new(1)).unwrap();
        let (_, valid) = table.read_row(RowId::new(1)).unwrap();
        assert!(!valid);

        // Deleted and out-of-range rows fail point mutations.
        assert!(matches!(
            table.update_row(RowId::new(1), &[SetClause::new("id", Value::int(9))]),
            Err(DbError::RowNotFound { .. })
        ));
        assert!(matches!(
            table.read_row(RowId::new(99)),
            Err(DbError::RowNotFound { .. })
        ));
    }

    #[test]
    fn write_row_overwrites_slots() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);
        table.insert(row(1, "a")).unwrap();

        table.write_row(RowId::new(0), &row(9, "w"), true).unwrap();
        let (values, valid) = table.read_row(RowId::new(0)).unwrap();
        assert!(valid);
        assert_eq!(values, row(9, "w"));

        table.write_row(RowId::new(0), &row(9, "w"), false).unwrap();
        let (_, valid) = table.read_row(RowId::new(0)).unwrap();
        assert!(!valid);
    }

    #[test]
    fn redo_is_appended_before_data_write() {
        let dir = tempdir().unwrap();
        let log = Arc::new(LogManager::open(dir.path().join("db.log")).unwrap());
        let table = open_table(&dir, Some(Arc::clone(&log)));

        table.insert(row(5, "e")).unwrap();
        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].op, LogOp::Insert);
        assert_eq!(records[0].table, "users");

        // The logged post-image matches the record on disk.
        table.flush().unwrap();
        let (values, valid) = table
            .schema()
            .decode_record(records[0].data.as_ref())
            .unwrap();
        assert!(valid);
        assert_eq!(values, row(5, "e"));
    }

    #[test]
    fn apply_redo_grows_the_heap() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);

        let record = users_schema()
            .encode_record(&row(10, "j"), true)
            .unwrap();
        table.apply_redo(RowId::new(4), &record).unwrap();
        assert_eq!(table.row_count(), 5);

        let (values, valid) = table.read_row(RowId::new(4)).unwrap();
        assert!(valid);
        assert_eq!(values, row(10, "j"));

        // Slots 0..4 were never written and decode as invalid.
        table.rebuild_free_list().unwrap();
        let reused = table.insert(row(1, "a")).unwrap();
        assert!(reused.as_u64() < 4);
        assert_eq!(table.row_count(), 5);
    }

    #[test]
    fn apply_redo_rejects_wrong_size() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);
        assert!(matches!(
            table.apply_redo(RowId::new(0), &[1, 2, 3]),
            Err(DbError::RedoSizeMismatch { .. })
        ));
    }

    #[test]
    fn rebuild_free_list_matches_validity_bytes() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);
        for i in 0..4 {
            table.insert(row(i, "x")).unwrap();
        }
        table
            .remove(Some(&Condition::new("id", Value::int(1))))
            .unwrap();
        table
            .remove(Some(&Condition::new("id", Value::int(3))))
            .unwrap();

        table.rebuild_free_list().unwrap();
        let mut free = table.meta.lock().free_list.clone();
        free.sort_unstable();
        assert_eq!(free, vec![1, 3]);
    }

    #[test]
    fn rebuild_for_schema_adds_column_with_defaults() {
        let dir = tempdir().unwrap();
        let table = open_table(&dir, None);
        table.insert(row(1, "a")).unwrap();
        table.insert(row(2, "b")).unwrap();
        table
            .remove(Some(&Condition::new("id", Value::int(2))))
            .unwrap();

        let mut columns = users_schema().columns().to_vec();
        columns.push(Column::int("age"));
        table.rebuild_for_schema(Schema::new(columns)).unwrap();

        assert_eq!(table.row_count(), 2);
        let (values, valid) = table.read_row(RowId::new(0)).unwrap();
        assert!(valid);
        assert_eq!(
            values,
            vec![Value::int(1), Value::text("a"), Value::int(0)]
        );
        // Row 1 kept its deleted state.
        let (_, valid) = table.read_row(RowId::new(1)).unwrap();
        assert!(!valid);

        // No backup or temp file is left behind.
        assert!(!dir.path().join("users.tbl.bak").exists());
        assert!(!dir.path().join("users.tbl.tmp").exists());

        // The free list was rebuilt for the new file.
        let reused = table.insert(vec![
            Value::int(5),
            Value::text("n"),
            Value::int(40),
        ])
        .unwrap();
        assert_eq!(reused, RowId::new(1));
    }

    #[test]
    fn oversized_records_are_rejected_at_load() {
        let dir = tempdir().unwrap();
        let table = TableStorage::new(
            dir.path().join("big.tbl"),
            "big",
            Schema::new(vec![Column::text("blob", PAGE as u32)]),
            PAGE,
            8,
            1,
            NumaOptions::disabled(),
            None,
        )
        .unwrap();
        assert!(matches!(
            table.load(),
            Err(DbError::RecordTooLarge { .. })
        ));
    }
}
