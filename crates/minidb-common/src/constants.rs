//! System-wide constants for minidb.

// =============================================================================
// Page and cache constants
// =============================================================================

/// Default page size in bytes (4 KB).
///
/// Matches the OS page size, which keeps NUMA-local allocations and file I/O
/// aligned to the same granularity.
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

/// Default number of cached pages per table file.
pub const DEFAULT_CACHE_PAGES: usize = 64;

// =============================================================================
// Table file format
// =============================================================================

/// Magic bytes at the start of every table file.
pub const TABLE_MAGIC: [u8; 4] = *b"TBL1";

/// Size of the table file header in bytes.
///
/// Layout: magic (4), record_size LE u32 (4), row_count LE u64 (8),
/// reserved LE u64 (8), zero padding to 32. The rest of page 0 is unused;
/// records begin at byte offset `page_size`.
pub const TABLE_HEADER_SIZE: usize = 32;

/// File extension for table heap files.
pub const TABLE_FILE_EXTENSION: &str = "tbl";

/// Default fixed length for TEXT columns declared without `(n)`.
pub const DEFAULT_TEXT_LENGTH: u32 = 64;

// =============================================================================
// Locking
// =============================================================================

/// Number of striped page locks per table.
///
/// A page's lock is `page_id % PAGE_LOCK_STRIPES`; distinct pages rarely
/// share a stripe while per-page exclusion is preserved.
pub const PAGE_LOCK_STRIPES: usize = 64;

// =============================================================================
// Database files
// =============================================================================

/// File name of the persisted catalog inside the data directory.
pub const CATALOG_FILE_NAME: &str = "catalog.meta";

/// File name of the redo log inside the data directory.
pub const LOG_FILE_NAME: &str = "db.log";
