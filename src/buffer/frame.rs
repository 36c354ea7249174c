use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// A single slot in the buffer pool's page array.
///
/// Control state (page id, pin count, dirty bit) lives in atomics; the
/// payload sits behind its own `RwLock` so page guards can hand out
/// references without holding the pool mutex. The pool mutex still decides
/// *which* page occupies the frame - the payload lock only arbitrates reads
/// and writes of the bytes themselves.
pub struct Frame {
    frame_id: FrameId,
    /// Page currently held, `INVALID_PAGE_ID` when the frame is free.
    page_id: AtomicI32,
    pin_count: AtomicU32,
    dirty: AtomicBool,
    /// Page payload. Wrapped in an `Arc` so guards can own the lock.
    pub(crate) data: Arc<RwLock<Box<[u8; PAGE_SIZE]>>>,
}

impl Frame {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicI32::new(INVALID_PAGE_ID.as_i32()),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_i32(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value, or `None` if it
    /// was already zero.
    pub fn unpin(&self) -> Option<u32> {
        loop {
            let current = self.pin_count.load(Ordering::Acquire);
            if current == 0 {
                return None;
            }
            if self
                .pin_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(current - 1);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// Resets control state and zeroes the payload, returning the frame to
    /// its freshly-constructed condition.
    pub fn reset(&self) {
        self.page_id
            .store(INVALID_PAGE_ID.as_i32(), Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
