use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{DbError, FrameId, PageId, Result};
use crate::storage::disk::DiskManager;

use super::frame::Frame;
use super::lru_replacer::LruReplacer;
use super::page_guard::{PageReadGuard, PageWriteGuard};

/// Page table and free list, guarded by the pool mutex.
struct PoolInner {
    /// Maps resident page ids to the frames holding them.
    page_table: HashMap<PageId, FrameId>,
    /// Frames not currently holding any page.
    free_list: VecDeque<FrameId>,
}

/// Shared pool state. Guards hold an `Arc` to this so their destructors can
/// unpin after the `BufferPool` handle itself has moved on.
pub(crate) struct PoolState {
    frames: Vec<Frame>,
    inner: Mutex<PoolInner>,
    replacer: LruReplacer,
    disk: Arc<DiskManager>,
}

/// BufferPool caches a bounded number of pages in memory, tracking pin
/// counts and dirty bits per frame and evicting unpinned pages in LRU order.
/// Dirty pages are written back when evicted and on explicit flush.
///
/// A single mutex serializes all control-state transitions (page table, free
/// list, replacer membership). Payload access is arbitrated separately by
/// per-frame locks via the page guards; synchronizing payload *content*
/// across operations is the caller's job (the B+ tree uses its own latch).
pub struct BufferPool {
    pool_size: usize,
    state: Arc<PoolState>,
}

impl BufferPool {
    pub fn new(pool_size: usize, disk: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(Frame::new(FrameId::new(i)));
            free_list.push_back(FrameId::new(i));
        }

        Self {
            pool_size,
            state: Arc::new(PoolState {
                frames,
                inner: Mutex::new(PoolInner {
                    page_table: HashMap::with_capacity(pool_size),
                    free_list,
                }),
                replacer: LruReplacer::new(pool_size),
                disk,
            }),
        }
    }

    /// Fetches a page for shared access, reading it from disk on a miss.
    /// Fails with `PoolExhausted` when every frame is pinned.
    pub fn fetch_read(&self, page_id: PageId) -> Result<PageReadGuard> {
        let frame_id = self.state.fetch(page_id)?;
        let data = self.state.frames[frame_id.as_usize()].data.read_arc();
        Ok(PageReadGuard::new(page_id, Arc::clone(&self.state), data))
    }

    /// Fetches a page for exclusive access, reading it from disk on a miss.
    pub fn fetch_write(&self, page_id: PageId) -> Result<PageWriteGuard> {
        let frame_id = self.state.fetch(page_id)?;
        let data = self.state.frames[frame_id.as_usize()].data.write_arc();
        Ok(PageWriteGuard::new(page_id, Arc::clone(&self.state), data))
    }

    /// Allocates a fresh page on disk and pins it in a zeroed frame.
    pub fn new_page(&self) -> Result<PageWriteGuard> {
        let (page_id, frame_id) = self.state.allocate()?;
        let data = self.state.frames[frame_id.as_usize()].data.write_arc();
        Ok(PageWriteGuard::new(page_id, Arc::clone(&self.state), data))
    }

    /// Decrements a page's pin count, OR-ing `dirty` into its dirty bit.
    /// The page guards call this on drop; misuse surfaces as an error.
    pub fn unpin_page(&self, page_id: PageId, dirty: bool) -> Result<()> {
        self.state.unpin(page_id, dirty)
    }

    /// Writes a resident page back to disk and clears its dirty bit.
    /// Returns false when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        {
            let data = frame.data.read();
            self.state.disk.write_page(page_id, &data[..])?;
        }
        frame.set_dirty(false);
        Ok(true)
    }

    /// Writes every resident dirty page back to disk, clearing dirty bits.
    pub fn flush_all(&self) -> Result<()> {
        let inner = self.state.inner.lock();
        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let data = frame.data.read();
                self.state.disk.write_page(page_id, &data[..])?;
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Drops a page from the pool, returning its frame to the free list.
    /// Returns false if the page is resident and pinned. A non-resident page
    /// is simply handed to the disk manager for deallocation.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            self.state.disk.deallocate_page(page_id);
            return true;
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return false;
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);
        self.state.disk.deallocate_page(page_id);
        true
    }

    /// Current pin count of a page, or `None` when it is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|f| self.state.frames[f.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    pub fn disk(&self) -> &Arc<DiskManager> {
        &self.state.disk
    }
}

impl PoolState {
    /// Pins `page_id` in a frame, loading it from disk if absent, and
    /// returns the frame index.
    fn fetch(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }

        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            self.frames[frame_id.as_usize()].pin();
            self.replacer.pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.find_victim(&mut inner)?;
        let frame = &self.frames[frame_id.as_usize()];

        {
            let mut data = frame.data.write();
            if let Err(e) = self.disk.read_page(page_id, &mut data[..]) {
                // Put the frame back rather than leaking it.
                frame.reset();
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        }

        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(frame_id)
    }

    /// Allocates a fresh page id and pins it in a zeroed frame.
    fn allocate(&self) -> Result<(PageId, FrameId)> {
        let mut inner = self.inner.lock();

        let frame_id = self.find_victim(&mut inner)?;
        let page_id = self.disk.allocate_page();
        let frame = &self.frames[frame_id.as_usize()];

        frame.data.write().fill(0);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok((page_id, frame_id))
    }

    /// Produces a reusable frame: from the free list when possible,
    /// otherwise by evicting the LRU unpinned frame (writing it back first
    /// if dirty). Fails with `PoolExhausted` when neither source has one.
    fn find_victim(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(DbError::PoolExhausted)?;
        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            debug!("evicting dirty page {old_page_id}, writing back");
            let data = frame.data.read();
            if let Err(e) = self.disk.write_page(old_page_id, &data[..]) {
                // Undo the eviction so the page stays reachable.
                self.replacer.unpin(frame_id);
                return Err(e);
            }
            frame.set_dirty(false);
        }

        inner.page_table.remove(&old_page_id);
        Ok(frame_id)
    }

    fn unpin(&self, page_id: PageId, dirty: bool) -> Result<()> {
        let inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Err(DbError::PageNotResident(page_id));
        };

        let frame = &self.frames[frame_id.as_usize()];
        if dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            Some(0) => {
                self.replacer.unpin(frame_id);
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(DbError::PinCountZero(page_id)),
        }
    }

    /// Guard-drop path; by construction the page is resident and pinned.
    pub(crate) fn release(&self, page_id: PageId, dirty: bool) {
        let result = self.unpin(page_id, dirty);
        debug_assert!(result.is_ok(), "guard release failed: {result:?}");
    }
}
