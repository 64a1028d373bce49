//! The database: lifecycle, catalog glue, recovery, and DML routing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use minidb_common::config::{DatabaseConfig, NumaOptions};
use minidb_common::constants::{CATALOG_FILE_NAME, LOG_FILE_NAME, TABLE_FILE_EXTENSION};
use minidb_common::memory::create_topology;
use minidb_common::RowId;
use minidb_wal::LogManager;

use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::schema::{Column, Schema};
use crate::table::TableStorage;
use crate::value::{Condition, SetClause, Value};
use crate::worker::NumaWorkerPool;

/// An open database: catalog, redo log, loaded tables, and the NUMA
/// worker pool that point operations are routed through.
///
/// Point operations (`read_row`, `update_row`, `delete_row`, `write_row`)
/// are submitted to the worker queue of the node that owns the row's
/// backing page, so the page's NUMA-local cache shard services any miss.
/// Bulk operations run on the calling thread.
pub struct Database {
    config: DatabaseConfig,
    catalog: Mutex<Catalog>,
    log: Arc<LogManager>,
    tables: RwLock<HashMap<String, Arc<TableStorage>>>,
    workers: NumaWorkerPool,
    numa: NumaOptions,
}

impl Database {
    /// Opens the database: ensures the data directory, loads the catalog
    /// and every table, replays the redo log, and starts the workers.
    pub fn open(config: DatabaseConfig) -> DbResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.base_dir).map_err(|source| DbError::Io {
            path: config.base_dir.clone(),
            source,
        })?;
        let numa = NumaOptions::from_env();

        let mut catalog = Catalog::new(config.base_dir.join(CATALOG_FILE_NAME));
        catalog.load()?;
        let log = Arc::new(LogManager::open(config.base_dir.join(LOG_FILE_NAME))?);

        let nodes = create_topology(&numa, config.numa_nodes).node_count();
        let workers = NumaWorkerPool::new(nodes, config.threads_per_node);

        let db = Self {
            config,
            catalog: Mutex::new(catalog),
            log,
            tables: RwLock::new(HashMap::new()),
            workers,
            numa,
        };
        db.load_tables()?;
        db.recover()?;
        db.workers.start();
        info!(
            dir = %db.config.base_dir.display(),
            nodes,
            tables = db.tables.read().len(),
            "database open"
        );
        Ok(db)
    }

    /// Checkpoints and stops the worker pool.
    pub fn close(&self) -> DbResult<()> {
        self.checkpoint()?;
        self.workers.stop();
        Ok(())
    }

    // =========================================================================
    // DDL
    // =========================================================================

    /// Creates a table and its backing file.
    pub fn create_table(&self, name: &str, columns: Vec<Column>) -> DbResult<()> {
        if columns.is_empty() {
            return Err(DbError::NoColumns);
        }
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if column.name.is_empty() {
                return Err(DbError::InvalidValue {
                    column: String::new(),
                    reason: "column name cannot be empty".to_string(),
                });
            }
            if !seen.insert(column.name.to_lowercase()) {
                return Err(DbError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }

        let key = name.to_lowercase();
        let schema = Schema::new(columns);
        self.catalog.lock().create_table(&key, schema.clone())?;

        let table = TableStorage::new(
            self.table_path(&key),
            key.clone(),
            schema,
            self.config.page_size,
            self.config.cache_pages,
            self.config.numa_nodes,
            self.numa.clone(),
            Some(Arc::clone(&self.log)),
        )?;
        table.load()?;
        self.tables.write().insert(key, Arc::new(table));
        Ok(())
    }

    /// Drops a table, its loaded state, and its file.
    pub fn drop_table(&self, name: &str) -> DbResult<()> {
        let key = name.to_lowercase();
        self.catalog.lock().drop_table(&key)?;
        self.tables.write().remove(&key);
        let path = self.table_path(&key);
        if let Err(source) = std::fs::remove_file(&path) {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(DbError::Io { path, source });
            }
        }
        Ok(())
    }

    /// Adds a column to a table, rebuilding its file with defaults.
    ///
    /// The rebuild itself writes no redo records, so the log is emptied by
    /// a checkpoint on both sides of it: no surviving record can refer to
    /// the replaced file's layout.
    pub fn alter_add_column(&self, name: &str, column: Column) -> DbResult<()> {
        let key = name.to_lowercase();
        let old_schema = self
            .catalog
            .lock()
            .get_schema(&key)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound {
                name: name.to_string(),
            })?;
        if old_schema.column_index(&column.name).is_some() {
            return Err(DbError::ColumnExists {
                table: name.to_string(),
                column: column.name,
            });
        }
        let table = self.table(&key)?;

        self.checkpoint()?;

        let mut columns = old_schema.columns().to_vec();
        columns.push(column.clone());
        table.rebuild_for_schema(Schema::new(columns))?;
        self.catalog.lock().alter_add_column(&key, column)?;

        self.checkpoint()
    }

    // =========================================================================
    // DML (bulk, scan-based)
    // =========================================================================

    /// Inserts a row; returns its row id.
    pub fn insert(&self, table: &str, values: Vec<Value>) -> DbResult<RowId> {
        let storage = self.table(table)?;
        let row_id = storage.insert(values)?;
        self.maybe_checkpoint()?;
        Ok(row_id)
    }

    /// Scans a table, returning rows that match the filter.
    pub fn select(
        &self,
        table: &str,
        filter: Option<&Condition>,
    ) -> DbResult<Vec<Vec<Value>>> {
        self.table(table)?.select(filter)
    }

    /// Scan-based update; returns the affected row count.
    pub fn update(
        &self,
        table: &str,
        sets: &[SetClause],
        filter: Option<&Condition>,
    ) -> DbResult<usize> {
        let storage = self.table(table)?;
        let updated = storage.update(sets, filter)?;
        self.maybe_checkpoint()?;
        Ok(updated)
    }

    /// Scan-based logical delete; returns the affected row count.
    pub fn remove(&self, table: &str, filter: Option<&Condition>) -> DbResult<usize> {
        let storage = self.table(table)?;
        let removed = storage.remove(filter)?;
        self.maybe_checkpoint()?;
        Ok(removed)
    }

    // =========================================================================
    // DML (point, routed to the owning NUMA node)
    // =========================================================================

    /// Reads one row on the node that owns its page.
    pub fn read_row(&self, table: &str, row_id: RowId) -> DbResult<(Vec<Value>, bool)> {
        let storage = self.table(table)?;
        self.dispatch(&storage, row_id, move |storage| storage.read_row(row_id))
    }

    /// Updates one row on the node that owns its page.
    pub fn update_row(
        &self,
        table: &str,
        row_id: RowId,
        sets: Vec<SetClause>,
    ) -> DbResult<()> {
        let storage = self.table(table)?;
        self.dispatch(&storage, row_id, move |storage| {
            storage.update_row(row_id, &sets)
        })?;
        self.maybe_checkpoint()
    }

    /// Deletes one row on the node that owns its page.
    pub fn delete_row(&self, table: &str, row_id: RowId) -> DbResult<()> {
        let storage = self.table(table)?;
        self.dispatch(&storage, row_id, move |storage| storage.delete_row(row_id))?;
        self.maybe_checkpoint()
    }

    /// Overwrites one row on the node that owns its page.
    pub fn write_row(
        &self,
        table: &str,
        row_id: RowId,
        values: Vec<Value>,
        valid: bool,
    ) -> DbResult<()> {
        let storage = self.table(table)?;
        self.dispatch(&storage, row_id, move |storage| {
            storage.write_row(row_id, &values, valid)
        })?;
        self.maybe_checkpoint()
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns a table's schema.
    pub fn get_schema(&self, table: &str) -> DbResult<Schema> {
        self.catalog
            .lock()
            .get_schema(table)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound {
                name: table.to_string(),
            })
    }

    /// Returns all table names, sorted.
    #[must_use]
    pub fn list_tables(&self) -> Vec<String> {
        self.catalog.lock().list_tables()
    }

    /// Returns the configured page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns the number of NUMA nodes the workers and caches use.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.workers.node_count()
    }

    /// Returns resident cache pages per node, summed over all tables.
    #[must_use]
    pub fn cached_pages_per_node(&self) -> Vec<usize> {
        let tables = self.tables.read();
        let mut totals = Vec::new();
        for table in tables.values() {
            for (node, count) in table.cached_pages_per_node().into_iter().enumerate() {
                if node >= totals.len() {
                    totals.resize(node + 1, 0);
                }
                totals[node] += count;
            }
        }
        totals
    }

    /// Returns resident cache pages per node for one table.
    pub fn table_cached_pages(&self, table: &str) -> DbResult<Vec<usize>> {
        Ok(self.table(table)?.cached_pages_per_node())
    }

    // =========================================================================
    // Checkpoint and recovery
    // =========================================================================

    /// Flushes every table in name order, then truncates the log.
    pub fn checkpoint(&self) -> DbResult<()> {
        let tables = self.tables.read();
        let mut names: Vec<&String> = tables.keys().collect();
        names.sort();
        for name in names {
            tables[name].flush()?;
        }
        self.log.clear()?;
        debug!("checkpoint complete");
        Ok(())
    }

    fn maybe_checkpoint(&self) -> DbResult<()> {
        if self.config.checkpoint_on_dml {
            self.checkpoint()
        } else {
            Ok(())
        }
    }

    /// Replays the redo log and rebuilds every free list.
    ///
    /// Replay is idempotent because records are full post-images; the log
    /// is truncated afterwards. A record naming an unknown table fails
    /// recovery, and that failure is fatal to the open.
    fn recover(&self) -> DbResult<()> {
        let records = self.log.read_all()?;
        if records.is_empty() {
            return Ok(());
        }
        let replayed = records.len();
        for record in records {
            let storage = self.table(&record.table)?;
            storage.apply_redo(record.row_id, record.data.as_ref())?;
        }
        let tables = self.tables.read();
        for table in tables.values() {
            table.rebuild_free_list()?;
        }
        drop(tables);
        // Replayed pages only live in the caches until flushed; checkpoint
        // before the log is truncated so a crash after recovery loses
        // nothing.
        self.checkpoint()?;
        info!(replayed, "recovery replayed redo log");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Runs a row operation on the worker queue of the row's owning node.
    fn dispatch<R, F>(&self, storage: &Arc<TableStorage>, row_id: RowId, f: F) -> DbResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&TableStorage) -> DbResult<R> + Send + 'static,
    {
        let node = storage.node_for_row(row_id);
        let storage = Arc::clone(storage);
        let handle = self.workers.submit(node, move || f(&storage));
        handle.wait().ok_or(DbError::TaskAbandoned {
            reason: "row operation".to_string(),
        })?
    }

    fn table(&self, name: &str) -> DbResult<Arc<TableStorage>> {
        self.tables
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| DbError::TableNotFound {
                name: name.to_string(),
            })
    }

    fn table_path(&self, key: &str) -> PathBuf {
        self.config
            .base_dir
            .join(format!("{key}.{TABLE_FILE_EXTENSION}"))
    }

    fn load_tables(&self) -> DbResult<()> {
        let catalog = self.catalog.lock();
        let mut tables = self.tables.write();
        for name in catalog.list_tables() {
            let Some(schema) = catalog.get_schema(&name) else {
                continue;
            };
            let table = TableStorage::new(
                self.table_path(&name),
                name.clone(),
                schema.clone(),
                self.config.page_size,
                self.config.cache_pages,
                self.config.numa_nodes,
                self.numa.clone(),
                Some(Arc::clone(&self.log)),
            )?;
            table.load()?;
            tables.insert(name, Arc::new(table));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dir", &self.config.base_dir)
            .field("tables", &self.list_tables())
            .field("nodes", &self.node_count())
            .finish()
    }
}
