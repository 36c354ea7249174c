use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool::PoolState;

type DataReadGuard = ArcRwLockReadGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;
type DataWriteGuard = ArcRwLockWriteGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;

/// RAII guard for read-only access to a pinned page. Dropping the guard
/// unpins the page without marking it dirty.
pub struct PageReadGuard {
    page_id: PageId,
    pool: Arc<PoolState>,
    data: Option<DataReadGuard>,
}

impl PageReadGuard {
    pub(crate) fn new(page_id: PageId, pool: Arc<PoolState>, data: DataReadGuard) -> Self {
        Self {
            page_id,
            pool,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("payload lock held until drop")[..]
    }
}

impl Deref for PageReadGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for PageReadGuard {
    fn drop(&mut self) {
        // Release the payload lock before the pool sees the unpin.
        self.data.take();
        self.pool.release(self.page_id, false);
    }
}

/// RAII guard for read-write access to a pinned page. The dirty flag is set
/// the first time the payload is borrowed mutably; dropping the guard unpins
/// the page, carrying that flag to the pool.
pub struct PageWriteGuard {
    page_id: PageId,
    pool: Arc<PoolState>,
    dirty: bool,
    data: Option<DataWriteGuard>,
}

impl PageWriteGuard {
    pub(crate) fn new(page_id: PageId, pool: Arc<PoolState>, data: DataWriteGuard) -> Self {
        Self {
            page_id,
            pool,
            dirty: false,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("payload lock held until drop")[..]
    }

    /// Mutable payload access. Marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.data.as_mut().expect("payload lock held until drop")[..]
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Deref for PageWriteGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for PageWriteGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for PageWriteGuard {
    fn drop(&mut self) {
        // Release the payload lock before the pool sees the unpin.
        self.data.take();
        self.pool.release(self.page_id, self.dirty);
    }
}
