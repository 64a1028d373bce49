//! NUMA-sharded buffer pool.
//!
//! The pool partitions its page budget across one [`PageCache`] shard per
//! NUMA node and routes every page to the shard chosen by the
//! [`PageNodeSelector`]. Shards are independently locked; operations on
//! pages owned by different nodes never contend.

use std::sync::Arc;

use parking_lot::Mutex;

use minidb_common::config::NumaOptions;
use minidb_common::memory::{create_allocator, create_topology};
use minidb_common::PageId;

use crate::cache::{Page, PageCache};
use crate::error::StorageResult;
use crate::pager::Pager;
use crate::selector::{ModuloSelector, PageNodeSelector};

/// One LRU page cache per NUMA node, routed by page id.
pub struct NumaBufferPool {
    shards: Vec<Mutex<PageCache>>,
    selector: Box<dyn PageNodeSelector>,
}

impl NumaBufferPool {
    /// Builds the pool over `pager` with the default modulo selector.
    ///
    /// `capacity` is the total page budget; each node receives
    /// `max(1, capacity / nodes)` pages. `preferred_nodes` overrides the
    /// probed node count when non-zero.
    pub fn new(
        pager: Arc<Pager>,
        capacity: usize,
        preferred_nodes: usize,
        numa: &NumaOptions,
    ) -> Self {
        Self::with_selector(
            pager,
            capacity,
            preferred_nodes,
            numa,
            Box::new(ModuloSelector),
        )
    }

    /// Builds the pool with a caller-supplied placement policy.
    pub fn with_selector(
        pager: Arc<Pager>,
        capacity: usize,
        preferred_nodes: usize,
        numa: &NumaOptions,
        selector: Box<dyn PageNodeSelector>,
    ) -> Self {
        let topology = create_topology(numa, preferred_nodes);
        let allocator = create_allocator(numa);
        let nodes = topology.node_count().max(1);
        let per_node = if nodes > 1 {
            (capacity / nodes).max(1)
        } else {
            capacity
        };

        let shards = (0..nodes)
            .map(|node| {
                Mutex::new(PageCache::new(
                    Arc::clone(&pager),
                    Arc::clone(&allocator),
                    per_node,
                    node,
                ))
            })
            .collect();

        Self { shards, selector }
    }

    /// Returns the number of shards (NUMA nodes).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the node the selector assigns to `page_id`, wrapped into
    /// range.
    #[must_use]
    pub fn node_for(&self, page_id: PageId) -> usize {
        let nodes = self.shards.len();
        self.selector.node_for(page_id, nodes) % nodes
    }

    /// Runs `f` against the (resident or freshly loaded) page.
    ///
    /// The shard mutex is held for the duration of `f`, which keeps the
    /// page pinned and totally orders operations within one shard.
    pub fn with_page<R>(
        &self,
        page_id: PageId,
        f: impl FnOnce(&mut Page) -> R,
    ) -> StorageResult<R> {
        let shard = &self.shards[self.node_for(page_id)];
        let mut cache = shard.lock();
        let page = cache.get_page(page_id)?;
        Ok(f(page))
    }

    /// Flags a page dirty in its owning shard; no-op if not resident.
    pub fn mark_dirty(&self, page_id: PageId) {
        let shard = &self.shards[self.node_for(page_id)];
        shard.lock().mark_dirty(page_id);
    }

    /// Flushes shards in node order, stopping at the first error.
    pub fn flush(&self) -> StorageResult<()> {
        for shard in &self.shards {
            shard.lock().flush()?;
        }
        Ok(())
    }

    /// Returns the resident page count of every shard, indexed by node.
    #[must_use]
    pub fn cached_pages_per_node(&self) -> Vec<usize> {
        self.shards
            .iter()
            .map(|shard| shard.lock().page_count())
            .collect()
    }
}

impl std::fmt::Debug for NumaBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumaBufferPool")
            .field("nodes", &self.shards.len())
            .field("cached_pages", &self.cached_pages_per_node())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: usize = 64;

    fn pool_over(dir: &tempfile::TempDir, capacity: usize, nodes: usize) -> NumaBufferPool {
        let pager = Arc::new(Pager::open(dir.path().join("t.tbl"), PAGE).unwrap());
        NumaBufferPool::new(pager, capacity, nodes, &NumaOptions::disabled())
    }

    #[test]
    fn pages_land_on_their_selector_node() {
        let dir = tempdir().unwrap();
        let pool = pool_over(&dir, 8, 2);
        assert_eq!(pool.node_count(), 2);

        for id in 0..6u64 {
            let owning = pool
                .with_page(PageId::new(id), |page| page.owning_node())
                .unwrap();
            assert_eq!(owning, (id % 2) as usize);
        }

        let counts = pool.cached_pages_per_node();
        assert_eq!(counts, vec![3, 3]);
    }

    #[test]
    fn per_node_capacity_is_floored_at_one() {
        let dir = tempdir().unwrap();
        let pool = pool_over(&dir, 1, 4);
        assert_eq!(pool.node_count(), 4);

        for id in 0..8u64 {
            pool.with_page(PageId::new(id), |_| ()).unwrap();
        }
        for count in pool.cached_pages_per_node() {
            assert!(count <= 1);
        }
    }

    #[test]
    fn writes_survive_flush() {
        let dir = tempdir().unwrap();
        let pager = Arc::new(Pager::open(dir.path().join("w.tbl"), PAGE).unwrap());
        let pool = NumaBufferPool::new(Arc::clone(&pager), 4, 2, &NumaOptions::disabled());

        pool.with_page(PageId::new(3), |page| {
            page.data_mut()[7] = 0x5A;
            page.mark_dirty();
        })
        .unwrap();
        pool.flush().unwrap();

        let mut out = [0u8; PAGE];
        pager.read_page(PageId::new(3), &mut out).unwrap();
        assert_eq!(out[7], 0x5A);
    }

    #[test]
    fn shards_evict_independently() {
        let dir = tempdir().unwrap();
        // Two nodes, one page each.
        let pool = pool_over(&dir, 2, 2);

        pool.with_page(PageId::new(1), |_| ()).unwrap(); // node 1
        pool.with_page(PageId::new(0), |_| ()).unwrap(); // node 0
        pool.with_page(PageId::new(2), |_| ()).unwrap(); // node 0, evicts page 0

        let counts = pool.cached_pages_per_node();
        assert_eq!(counts[0], 1);
        // Node 1 was untouched by node 0's eviction.
        assert_eq!(counts[1], 1);
    }

    #[test]
    fn single_node_keeps_full_budget() {
        let dir = tempdir().unwrap();
        let pool = pool_over(&dir, 6, 1);

        for id in 0..6u64 {
            pool.with_page(PageId::new(id), |_| ()).unwrap();
        }
        assert_eq!(pool.cached_pages_per_node(), vec![6]);
    }
}
