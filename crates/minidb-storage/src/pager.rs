//! Synchronized fixed-page file I/O.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use minidb_common::PageId;

use crate::error::{StorageError, StorageResult};

/// Fixed-page reader/writer over a single file.
///
/// One mutex serializes all file I/O. The pager performs no caching and no
/// dirty tracking; those live in the page cache above it.
///
/// Reads past the end of the file succeed and return a zero-filled page, so
/// callers can treat the file as an infinite array of pages. Writes extend
/// the file implicitly via a positioned write at `page_id * page_size`.
pub struct Pager {
    file: Mutex<File>,
    path: PathBuf,
    page_size: usize,
}

impl Pager {
    /// Opens (creating if necessary) the file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the current file size in bytes (0 on error).
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file
            .lock()
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Reads one page into `out`, zero-filling anything past EOF.
    ///
    /// `out.len()` must equal the page size. A read that starts past the end
    /// of the file yields an all-zero page; a short read zero-pads the tail.
    pub fn read_page(&self, page_id: PageId, out: &mut [u8]) -> StorageResult<()> {
        if out.len() != self.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.page_size,
                actual: out.len(),
            });
        }
        let offset = page_id.byte_offset(self.page_size);
        let mut file = self.file.lock();
        out.fill(0);

        let file_size = file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| self.io_error(offset, source))?;
        if offset >= file_size {
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))
            .map_err(|source| self.io_error(offset, source))?;
        let mut filled = 0;
        while filled < out.len() {
            match file.read(&mut out[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(self.io_error(offset, source)),
            }
        }
        // A short read means EOF inside the page; the tail is already zero.
        Ok(())
    }

    /// Writes one full page at its offset, extending the file if needed.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> StorageResult<()> {
        if data.len() != self.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.page_size,
                actual: data.len(),
            });
        }
        let offset = page_id.byte_offset(self.page_size);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| self.io_error(offset, source))?;
        file.write_all(data)
            .map_err(|source| self.io_error(offset, source))?;
        Ok(())
    }

    /// Flushes the file to stable storage.
    pub fn flush(&self) -> StorageResult<()> {
        let file = self.file.lock();
        file.sync_all().map_err(|source| StorageError::Io {
            path: self.path.clone(),
            offset: 0,
            source,
        })
    }

    fn io_error(&self, offset: u64, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            offset,
            source,
        }
    }
}

impl std::fmt::Debug for Pager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: usize = 128;

    fn open_pager(name: &str, dir: &tempfile::TempDir) -> Pager {
        Pager::open(dir.path().join(name), PAGE).unwrap()
    }

    #[test]
    fn read_past_eof_is_zero_filled() {
        let dir = tempdir().unwrap();
        let pager = open_pager("a.tbl", &dir);

        let mut buf = [0xFFu8; PAGE];
        pager.read_page(PageId::new(7), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let pager = open_pager("b.tbl", &dir);

        let mut page = [0u8; PAGE];
        page[0] = 1;
        page[PAGE - 1] = 9;
        pager.write_page(PageId::new(2), &page).unwrap();

        let mut out = [0u8; PAGE];
        pager.read_page(PageId::new(2), &mut out).unwrap();
        assert_eq!(out, page);
        // Pages 0 and 1 were never written; the file was extended with zeros.
        pager.read_page(PageId::new(0), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
        assert_eq!(pager.file_size(), 3 * PAGE as u64);
    }

    #[test]
    fn short_tail_is_zero_padded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.tbl");
        std::fs::write(&path, [0xAB; 10]).unwrap();

        let pager = Pager::open(&path, PAGE).unwrap();
        let mut out = [0xFFu8; PAGE];
        pager.read_page(PageId::new(0), &mut out).unwrap();
        assert!(out[..10].iter().all(|&b| b == 0xAB));
        assert!(out[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let pager = open_pager("d.tbl", &dir);

        let mut small = [0u8; PAGE - 1];
        assert!(matches!(
            pager.read_page(PageId::new(0), &mut small),
            Err(StorageError::PageSizeMismatch { .. })
        ));
        assert!(matches!(
            pager.write_page(PageId::new(0), &small),
            Err(StorageError::PageSizeMismatch { .. })
        ));
    }

    #[test]
    fn write_after_eof_read_succeeds() {
        let dir = tempdir().unwrap();
        let pager = open_pager("e.tbl", &dir);

        let mut buf = [0u8; PAGE];
        pager.read_page(PageId::new(4), &mut buf).unwrap();

        buf[3] = 42;
        pager.write_page(PageId::new(4), &buf).unwrap();
        let mut out = [0u8; PAGE];
        pager.read_page(PageId::new(4), &mut out).unwrap();
        assert_eq!(out[3], 42);
    }
}
