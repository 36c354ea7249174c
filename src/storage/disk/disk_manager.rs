use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{DbError, PageId, Result, PAGE_SIZE};

/// DiskManager is responsible for reading and writing pages to/from a single
/// database file. Page id `i` occupies byte range `[i * PAGE_SIZE, (i + 1) *
/// PAGE_SIZE)`. Fresh ids are handed out monotonically starting at
/// `file_size / PAGE_SIZE`.
///
/// The struct itself only serializes access to the file cursor; higher-level
/// ordering (who reads or writes which page when) is the buffer pool's job.
pub struct DiskManager {
    file: Mutex<File>,
    path: PathBuf,
    /// Next page id to hand out.
    next_page_id: AtomicI32,
    /// Number of disk reads performed
    num_reads: AtomicU64,
    /// Number of disk writes performed
    num_writes: AtomicU64,
}

impl DiskManager {
    /// Opens (or creates) the database file at `path`. Missing parent
    /// directories are created as well.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let next_page_id = (file_size / PAGE_SIZE as u64) as i32;

        Ok(Self {
            file: Mutex::new(file),
            path,
            next_page_id: AtomicI32::new(next_page_id),
            num_reads: AtomicU64::new(0),
            num_writes: AtomicU64::new(0),
        })
    }

    /// Reads a page from disk into the provided buffer. Fails with
    /// `ShortRead` if the file holds fewer than `PAGE_SIZE` bytes at the
    /// page's offset.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.file_offset()))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(DbError::ShortRead {
                    page_id,
                    got: filled,
                    expected: PAGE_SIZE,
                });
            }
            filled += n;
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page to disk from the provided buffer. Writing past the
    /// current end of file extends it. No fsync is issued; a single write
    /// guarantees nothing about durability.
    pub fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.file_offset()))?;
        file.write_all(buf)?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Hands out the next page id. Ids grow monotonically for the lifetime
    /// of the file; nothing is written until the page itself is.
    pub fn allocate_page(&self) -> PageId {
        PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Advisory; reclaiming file space is not supported.
    pub fn deallocate_page(&self, _page_id: PageId) {}

    /// Number of pages allocated so far (equivalently, the next fresh id).
    pub fn num_pages(&self) -> i32 {
        self.next_page_id.load(Ordering::Relaxed)
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes file contents and metadata to stable storage. The handle
    /// itself is closed when the manager is dropped.
    pub fn close(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.file.get_mut().sync_all();
    }
}
