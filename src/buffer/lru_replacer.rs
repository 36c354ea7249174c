use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::common::FrameId;

struct LruInner {
    /// Eviction order: least-recently-unpinned at the front.
    order: VecDeque<FrameId>,
    /// Membership set for the queue.
    present: HashSet<FrameId>,
}

/// LRU replacement policy over unpinned frames.
///
/// Frames enter via `unpin` (becoming most-recently-used), leave via `pin`
/// when a caller takes a reference, and `victim` surrenders the
/// least-recently-used frame for reuse. A frame is tracked here exactly when
/// it is resident with a pin count of zero.
pub struct LruReplacer {
    capacity: usize,
    inner: Mutex<LruInner>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(LruInner {
                order: VecDeque::with_capacity(capacity),
                present: HashSet::with_capacity(capacity),
            }),
        }
    }

    /// Removes and returns the least-recently-used frame, or `None` if no
    /// frame is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        let frame_id = inner.order.pop_front()?;
        inner.present.remove(&frame_id);
        Some(frame_id)
    }

    /// Marks a frame as in use, removing it from eviction candidacy.
    pub fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.present.remove(&frame_id) {
            inner.order.retain(|&f| f != frame_id);
        }
    }

    /// Marks a frame as reusable, inserting it as most-recently-used. A
    /// frame already tracked stays where it is; when the replacer is full
    /// the call is a no-op (the pool makes room via `victim` first).
    pub fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.present.contains(&frame_id) {
            return;
        }
        if inner.order.len() >= self.capacity {
            return;
        }
        inner.order.push_back(frame_id);
        inner.present.insert(frame_id);
    }

    /// Removes a frame from tracking entirely (page deletion).
    pub fn remove(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.present.remove(&frame_id) {
            inner.order.retain(|&f| f != frame_id);
        }
    }

    /// Number of evictable frames.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victim_empty() {
        let replacer = LruReplacer::new(4);
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_victim_order() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(FrameId::new(2));
        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));

        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_pin_removes_candidate() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));

        replacer.pin(FrameId::new(0));

        assert_eq!(replacer.len(), 1);
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_unpin_idempotent() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(0));
        assert_eq!(replacer.len(), 1);
    }

    #[test]
    fn test_unpin_at_capacity_is_noop() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(2));

        assert_eq!(replacer.len(), 2);
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_re_unpin_does_not_refresh_position() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(0));

        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    }
}
