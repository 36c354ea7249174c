use std::sync::Arc;

use crate::buffer::{BufferPool, PageReadGuard};
use crate::common::Result;

use super::node::NodeRef;

/// Cursor over the leaf chain of a B+ tree, yielding (key, value) pairs in
/// ascending key order. Holds exactly one pinned leaf at a time; advancing
/// past the end of a leaf unpins it and follows the next-leaf pointer.
///
/// Values come back at their full fixed slot width, padding included;
/// callers that want the logical value trim trailing zeros themselves.
pub struct TreeIterator {
    bpm: Arc<BufferPool>,
    leaf: Option<PageReadGuard>,
    index: i32,
}

impl TreeIterator {
    pub(crate) fn new(bpm: Arc<BufferPool>, leaf: PageReadGuard) -> Self {
        Self {
            bpm,
            leaf: Some(leaf),
            index: 0,
        }
    }

    /// Yields the next entry, or `None` once the leaf chain is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(i64, Vec<u8>)>> {
        loop {
            let Some(guard) = self.leaf.as_ref() else {
                return Ok(None);
            };

            let next = {
                let node = NodeRef::new(guard.data());
                if self.index < node.count() {
                    let key = node.key(self.index);
                    let value = node.value(self.index).to_vec();
                    self.index += 1;
                    return Ok(Some((key, value)));
                }
                node.next_page_id()
            };

            // Unpin the exhausted leaf before pinning its successor.
            self.leaf = None;
            if let Some(next_id) = next {
                self.leaf = Some(self.bpm.fetch_read(next_id)?);
                self.index = 0;
            }
        }
    }

    /// Releases the pinned leaf. Also happens on drop.
    pub fn close(&mut self) {
        self.leaf = None;
    }
}

impl Iterator for TreeIterator {
    type Item = Result<(i64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}
