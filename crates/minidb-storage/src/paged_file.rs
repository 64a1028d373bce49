//! Byte-offset reads and writes over the buffer pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use minidb_common::config::NumaOptions;
use minidb_common::PageId;

use crate::error::StorageResult;
use crate::pager::Pager;
use crate::pool::NumaBufferPool;

/// A file addressed by byte offset, cached page by page.
///
/// Every read and write traverses the NUMA buffer pool: the range
/// `[offset, offset + len)` is split at page boundaries and each chunk is
/// copied under the owning shard's lock, with written pages marked dirty.
///
/// Multi-page operations are **not** atomic: a failure midway leaves the
/// earlier pages modified and dirty. Callers that need whole-record
/// consistency keep records page-aligned or replay them from the redo log.
pub struct PagedFile {
    pager: Arc<Pager>,
    pool: NumaBufferPool,
    cache_pages: usize,
    numa_nodes: usize,
    numa: NumaOptions,
}

impl PagedFile {
    /// Opens (creating if necessary) a paged file.
    ///
    /// `cache_pages` is the total cache budget split across NUMA shards;
    /// `numa_nodes` overrides the probed node count when non-zero.
    pub fn open(
        path: impl AsRef<Path>,
        page_size: usize,
        cache_pages: usize,
        numa_nodes: usize,
        numa: NumaOptions,
    ) -> StorageResult<Self> {
        let pager = Arc::new(Pager::open(path, page_size)?);
        let pool = NumaBufferPool::new(Arc::clone(&pager), cache_pages, numa_nodes, &numa);
        Ok(Self {
            pager,
            pool,
            cache_pages,
            numa_nodes,
            numa,
        })
    }

    /// Rebinds to a different file, dropping every cached page.
    ///
    /// Used after a schema rebuild replaces the table file on disk.
    pub fn reset(&mut self, path: impl AsRef<Path>) -> StorageResult<()> {
        let pager = Arc::new(Pager::open(path, self.pager.page_size())?);
        self.pool = NumaBufferPool::new(
            Arc::clone(&pager),
            self.cache_pages,
            self.numa_nodes,
            &self.numa,
        );
        self.pager = pager;
        Ok(())
    }

    /// Reads `len` bytes starting at `offset`.
    pub fn read_item(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let page_size = self.pager.page_size() as u64;
        let mut out = vec![0u8; len];
        let mut remaining = len;
        let mut current = offset;
        let mut dest = 0usize;
        while remaining > 0 {
            let page_id = PageId::containing(current, page_size as usize);
            let page_offset = (current % page_size) as usize;
            let chunk = remaining.min(page_size as usize - page_offset);
            self.pool.with_page(page_id, |page| {
                out[dest..dest + chunk]
                    .copy_from_slice(&page.data()[page_offset..page_offset + chunk]);
            })?;
            current += chunk as u64;
            dest += chunk;
            remaining -= chunk;
        }
        Ok(out)
    }

    /// Writes `data` starting at `offset`, marking touched pages dirty.
    pub fn write_item(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let page_size = self.pager.page_size() as u64;
        let mut remaining = data.len();
        let mut current = offset;
        let mut src = 0usize;
        while remaining > 0 {
            let page_id = PageId::containing(current, page_size as usize);
            let page_offset = (current % page_size) as usize;
            let chunk = remaining.min(page_size as usize - page_offset);
            self.pool.with_page(page_id, |page| {
                page.data_mut()[page_offset..page_offset + chunk]
                    .copy_from_slice(&data[src..src + chunk]);
                page.mark_dirty();
            })?;
            current += chunk as u64;
            src += chunk;
            remaining -= chunk;
        }
        Ok(())
    }

    /// Writes all dirty pages back and syncs the file.
    pub fn flush(&self) -> StorageResult<()> {
        self.pool.flush()
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.pager.page_size()
    }

    /// Returns the on-disk size in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.pager.file_size()
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.pager.path().to_path_buf()
    }

    /// Returns the number of NUMA shards backing this file.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.pool.node_count()
    }

    /// Returns the NUMA node that owns the given page.
    #[must_use]
    pub fn node_for_page(&self, page_id: PageId) -> usize {
        self.pool.node_for(page_id)
    }

    /// Returns the resident page count per NUMA node.
    #[must_use]
    pub fn cached_pages_per_node(&self) -> Vec<usize> {
        self.pool.cached_pages_per_node()
    }
}

impl std::fmt::Debug for PagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedFile")
            .field("path", &self.pager.path())
            .field("page_size", &self.pager.page_size())
            .field("nodes", &self.pool.node_count())
            .finish()
    }
}
