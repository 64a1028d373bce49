//! Per-node LRU page cache.
//!
//! Each NUMA node owns one `PageCache`. The cache is a classic intrusive
//! doubly-linked list plus hash map: the map holds a pointer to the page's
//! list node, so hits are O(1) with no scanning. Page buffers are allocated
//! on the shard's node and live exactly as long as their cache entry.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::trace;

use minidb_common::memory::{NumaAllocator, PageBuffer};
use minidb_common::PageId;

use crate::error::{StorageError, StorageResult};
use crate::pager::Pager;

/// A cached page: identity, node-local buffer, and dirty flag.
pub struct Page {
    id: PageId,
    buffer: PageBuffer,
    dirty: bool,
    owning_node: usize,
}

impl Page {
    /// Returns the page id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Returns the NUMA node that owns this page's buffer.
    #[inline]
    #[must_use]
    pub fn owning_node(&self) -> usize {
        self.owning_node
    }

    /// Returns whether the page has unwritten modifications.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the page contents.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the page contents mutably.
    ///
    /// Callers that modify the page must also mark it dirty, either here
    /// via [`Page::mark_dirty`] or through the owning cache.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Flags the page as modified so eviction and flush write it back.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("dirty", &self.dirty)
            .field("owning_node", &self.owning_node)
            .finish()
    }
}

/// A node in the LRU list.
struct Node {
    page: Page,
    prev: Option<NonNull<Node>>,
    next: Option<NonNull<Node>>,
}

/// Bounded LRU cache of pages for one NUMA node.
///
/// Not internally synchronized; [`crate::NumaBufferPool`] wraps each shard
/// in its own mutex, which is what keeps operations on different nodes from
/// contending.
pub struct PageCache {
    pager: Arc<Pager>,
    allocator: Arc<dyn NumaAllocator>,
    node: usize,
    /// Maximum resident pages; 0 means unbounded.
    capacity: usize,
    page_size: usize,
    map: HashMap<PageId, NonNull<Node>>,
    /// Most recently used.
    head: Option<NonNull<Node>>,
    /// Least recently used; eviction victim.
    tail: Option<NonNull<Node>>,
}

// The cache exclusively owns its nodes; the raw pointers never escape.
unsafe impl Send for PageCache {}

impl PageCache {
    /// Creates a cache for `node` with the given capacity (0 = unbounded).
    pub fn new(
        pager: Arc<Pager>,
        allocator: Arc<dyn NumaAllocator>,
        capacity: usize,
        node: usize,
    ) -> Self {
        let page_size = pager.page_size();
        Self {
            pager,
            allocator,
            node,
            capacity,
            page_size,
            map: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    /// Returns the number of resident pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.map.len()
    }

    /// Returns the configured capacity (0 = unbounded).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the NUMA node this shard belongs to.
    #[must_use]
    pub fn node(&self) -> usize {
        self.node
    }

    /// Returns the page, loading it from the pager on a miss.
    ///
    /// A hit moves the page to the LRU front. A miss may first evict the
    /// LRU tail; a dirty victim is written back, and a write-back failure
    /// aborts both the eviction and this call with the victim still
    /// resident. A failure on the miss path (allocation or read) leaves the
    /// cache unchanged.
    pub fn get_page(&mut self, page_id: PageId) -> StorageResult<&mut Page> {
        if let Some(&ptr) = self.map.get(&page_id) {
            self.move_to_front(ptr);
            // SAFETY: the pointer came from the map and stays valid until
            // the entry is removed.
            return Ok(unsafe { &mut (*ptr.as_ptr()).page });
        }

        self.evict_if_full()?;

        let mut buffer = self
            .allocator
            .allocate(self.page_size, self.node)
            .ok_or(StorageError::AllocFailed {
                node: self.node,
                size: self.page_size,
            })?;
        self.pager.read_page(page_id, &mut buffer)?;

        let node = Box::new(Node {
            page: Page {
                id: page_id,
                buffer,
                dirty: false,
                owning_node: self.node,
            },
            prev: None,
            next: None,
        });
        // SAFETY: Box::into_raw never returns null.
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(node)) };
        self.push_front(ptr);
        self.map.insert(page_id, ptr);
        Ok(unsafe { &mut (*ptr.as_ptr()).page })
    }

    /// Flags a resident page as dirty; no-op if the page was evicted.
    pub fn mark_dirty(&mut self, page_id: PageId) {
        if let Some(&ptr) = self.map.get(&page_id) {
            // SAFETY: map pointers are valid while the entry exists.
            unsafe { (*ptr.as_ptr()).page.dirty = true };
        }
    }

    /// Writes every dirty page back and flushes the pager.
    pub fn flush(&mut self) -> StorageResult<()> {
        let mut cursor = self.head;
        while let Some(ptr) = cursor {
            // SAFETY: list pointers are valid; we only mutate the page.
            let node = unsafe { &mut *ptr.as_ptr() };
            if node.page.dirty {
                self.pager.write_page(node.page.id, node.page.data())?;
                node.page.dirty = false;
            }
            cursor = node.next;
        }
        self.pager.flush()
    }

    /// Evicts the LRU tail when the cache is at capacity.
    fn evict_if_full(&mut self) -> StorageResult<()> {
        if self.capacity == 0 || self.map.len() < self.capacity {
            return Ok(());
        }
        let Some(victim) = self.tail else {
            return Ok(());
        };
        // SAFETY: tail is a live node.
        let page = unsafe { &(*victim.as_ptr()).page };
        if page.dirty {
            // Write-back failure keeps the victim resident and dirty.
            self.pager.write_page(page.id, page.data())?;
        }
        let id = page.id;
        let was_dirty = page.dirty;
        self.unlink(victim);
        self.map.remove(&id);
        // SAFETY: the node is out of the map and the list; we own it again.
        drop(unsafe { Box::from_raw(victim.as_ptr()) });
        if was_dirty {
            trace!(page = %id, node = self.node, "wrote back and evicted dirty page");
        }
        Ok(())
    }

    fn move_to_front(&mut self, ptr: NonNull<Node>) {
        if Some(ptr) == self.head {
            return;
        }
        self.unlink(ptr);
        self.push_front(ptr);
    }

    fn push_front(&mut self, ptr: NonNull<Node>) {
        // SAFETY: ptr is a live node not currently in the list.
        unsafe {
            (*ptr.as_ptr()).prev = None;
            (*ptr.as_ptr()).next = self.head;
            if let Some(head) = self.head {
                (*head.as_ptr()).prev = Some(ptr);
            }
            self.head = Some(ptr);
            if self.tail.is_none() {
                self.tail = Some(ptr);
            }
        }
    }

    fn unlink(&mut self, ptr: NonNull<Node>) {
        // SAFETY: ptr is a live node currently in the list.
        unsafe {
            let prev = (*ptr.as_ptr()).prev;
            let next = (*ptr.as_ptr()).next;
            if let Some(prev) = prev {
                (*prev.as_ptr()).next = next;
            } else {
                self.head = next;
            }
            if let Some(next) = next {
                (*next.as_ptr()).prev = prev;
            } else {
                self.tail = prev;
            }
        }
    }
}

impl Drop for PageCache {
    fn drop(&mut self) {
        let mut cursor = self.head;
        while let Some(ptr) = cursor {
            // SAFETY: every list node was created by Box::into_raw.
            unsafe {
                cursor = (*ptr.as_ptr()).next;
                drop(Box::from_raw(ptr.as_ptr()));
            }
        }
        self.map.clear();
        self.head = None;
        self.tail = None;
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("node", &self.node)
            .field("capacity", &self.capacity)
            .field("resident", &self.map.len())
            .finish()
    }
}
