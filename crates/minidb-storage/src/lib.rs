//! # minidb-storage
//!
//! Page-addressed storage for minidb:
//!
//! - [`Pager`]: synchronized fixed-page I/O on a single file
//! - [`PageCache`]: bounded per-node LRU over the pager
//! - [`NumaBufferPool`]: one cache shard per NUMA node, routed by page id
//! - [`PagedFile`]: byte-offset reads and writes over the pool
//!
//! Page buffers are allocated on the node that owns their shard, so a
//! worker pinned to that node services its misses from local memory.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod error;
mod paged_file;
mod pager;
mod pool;
mod selector;

pub use cache::{Page, PageCache};
pub use error::{StorageError, StorageResult};
pub use paged_file::PagedFile;
pub use pager::Pager;
pub use pool::NumaBufferPool;
pub use selector::{ModuloSelector, PageNodeSelector};
