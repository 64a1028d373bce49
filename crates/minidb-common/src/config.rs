//! Configuration for minidb.
//!
//! All environment-variable access lives in [`NumaOptions::from_env`];
//! every other component receives its configuration explicitly.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_CACHE_PAGES, DEFAULT_PAGE_SIZE};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The page size is zero or otherwise unusable.
    #[error("invalid page size {0}: must be at least 64 bytes")]
    InvalidPageSize(usize),
    /// The data directory path is empty.
    #[error("data directory path is empty")]
    EmptyDataDir,
}

/// Top-level database configuration.
///
/// # Example
///
/// ```
/// use minidb_common::DatabaseConfig;
///
/// let config = DatabaseConfig::new("./data")
///     .with_page_size(4096)
///     .with_cache_pages(64)
///     .with_numa_nodes(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the catalog, log, and table files.
    pub base_dir: PathBuf,
    /// Page size in bytes for every table file.
    pub page_size: usize,
    /// Total cached pages per table, partitioned across NUMA nodes.
    pub cache_pages: usize,
    /// Preferred NUMA node count; 0 means probe (env, then platform).
    pub numa_nodes: usize,
    /// Worker threads pinned to each NUMA node.
    pub threads_per_node: usize,
    /// Whether every successful DML statement triggers a checkpoint
    /// (flush all tables, truncate the log). Disabling this batches
    /// redo records until an explicit checkpoint or `close`.
    pub checkpoint_on_dml: bool,
}

impl DatabaseConfig {
    /// Creates a configuration with defaults for the given data directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
            cache_pages: DEFAULT_CACHE_PAGES,
            numa_nodes: 0,
            threads_per_node: 2,
            checkpoint_on_dml: true,
        }
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the cached page budget per table.
    #[must_use]
    pub fn with_cache_pages(mut self, cache_pages: usize) -> Self {
        self.cache_pages = cache_pages;
        self
    }

    /// Sets the preferred NUMA node count (0 = probe).
    #[must_use]
    pub fn with_numa_nodes(mut self, nodes: usize) -> Self {
        self.numa_nodes = nodes;
        self
    }

    /// Sets the number of worker threads per NUMA node.
    #[must_use]
    pub fn with_threads_per_node(mut self, threads: usize) -> Self {
        self.threads_per_node = threads;
        self
    }

    /// Enables or disables checkpoint-after-DML.
    #[must_use]
    pub fn with_checkpoint_on_dml(mut self, enabled: bool) -> Self {
        self.checkpoint_on_dml = enabled;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        if self.page_size < 64 {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }
}

/// NUMA behaviour switches, read from the environment exactly once.
///
/// Recognised variables:
///
/// - `MINI_DB_ENABLE_NUMA=0|false|off` disables NUMA-aware allocation and
///   topology probing (anything else, including unset, enables them).
/// - `MINI_DB_NUMA_NODES=<n>` supplies the node count used when the caller
///   passes 0 as the preferred count.
/// - `MINI_DB_NUMA_ALLOC_NODE=<n>` forces every page buffer onto node `n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumaOptions {
    /// Whether NUMA-aware allocation and topology probing are enabled.
    pub enabled: bool,
    /// Node count from `MINI_DB_NUMA_NODES`; 0 when unset or invalid.
    pub env_nodes: usize,
    /// Forced allocation node from `MINI_DB_NUMA_ALLOC_NODE`.
    pub forced_alloc_node: Option<usize>,
}

impl NumaOptions {
    /// Reads the options from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = match env::var("MINI_DB_ENABLE_NUMA") {
            Ok(value) => {
                let value = value.trim().to_ascii_lowercase();
                !(value == "0" || value == "false" || value == "off")
            }
            Err(_) => true,
        };
        let env_nodes = env::var("MINI_DB_NUMA_NODES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let forced_alloc_node = env::var("MINI_DB_NUMA_ALLOC_NODE")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());
        Self {
            enabled,
            env_nodes,
            forced_alloc_node,
        }
    }

    /// Options with NUMA enabled and nothing forced; useful in tests.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            env_nodes: 0,
            forced_alloc_node: None,
        }
    }
}

impl Default for NumaOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            env_nodes: 0,
            forced_alloc_node: None,
        }
    }
}
