//! Page-to-node placement policy.

use minidb_common::PageId;

/// Decides which NUMA node owns a page.
///
/// A capability seam rather than a class hierarchy: the pool holds a trait
/// object and wraps any out-of-range answer back into `[0, node_count)`.
pub trait PageNodeSelector: Send + Sync {
    /// Returns the node that should cache `page_id`.
    fn node_for(&self, page_id: PageId, node_count: usize) -> usize;
}

/// Default policy: `page_id % node_count`.
///
/// Consecutive pages land on different nodes, so a sequential heap spreads
/// evenly across shards.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuloSelector;

impl PageNodeSelector for ModuloSelector {
    fn node_for(&self, page_id: PageId, node_count: usize) -> usize {
        if node_count == 0 {
            return 0;
        }
        (page_id.as_u64() % node_count as u64) as usize
    }
}
