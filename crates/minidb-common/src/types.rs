//! Core identifier types for minidb.
//!
//! Type-safe wrappers around the numeric identifiers that flow between the
//! storage, log, and engine layers, so a page id cannot silently stand in
//! for a row id or a log sequence number.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Page identifier: index of a fixed-size page within a paged file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(u64);

impl PageId {
    /// Creates a page id from a raw u64.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the page containing the given byte offset.
    #[inline]
    #[must_use]
    pub const fn containing(offset: u64, page_size: usize) -> Self {
        Self(offset / page_size as u64)
    }

    /// Returns the byte offset of this page's first byte.
    #[inline]
    #[must_use]
    pub const fn byte_offset(self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<PageId> for u64 {
    #[inline]
    fn from(id: PageId) -> Self {
        id.0
    }
}

/// Row identifier: slot index within a table heap.
///
/// Row ids are dense in `[0, row_count)`; a deleted row's id goes on the
/// table's free list and is reused by a later insert.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RowId(u64);

impl RowId {
    /// Creates a row id from a raw u64.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.0)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RowId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<RowId> for u64 {
    #[inline]
    fn from(id: RowId) -> Self {
        id.0
    }
}

/// Log sequence number.
///
/// Monotonic within one `LogManager` lifetime; the counter restarts at
/// [`Lsn::FIRST`] on every construction. Recovery replays records in file
/// order and never compares LSNs across process restarts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Lsn(u64);

impl Lsn {
    /// The first LSN handed out by a fresh log.
    pub const FIRST: Self = Self(1);

    /// Creates an LSN from a raw u64.
    #[inline]
    #[must_use]
    pub const fn new(lsn: u64) -> Self {
        Self(lsn)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next LSN.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lsn({})", self.0)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Lsn {
    #[inline]
    fn from(lsn: u64) -> Self {
        Self(lsn)
    }
}
