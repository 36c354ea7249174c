use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::buffer::{BufferPool, PageWriteGuard};
use crate::common::{DbError, PageId, Result, INVALID_PAGE_ID};

use super::iterator::TreeIterator;
use super::node::{NodeKind, NodeMut, NodeRef, VALUE_SIZE};

/// Disk-resident B+ tree mapping i64 keys to fixed-width byte values.
///
/// The handle is a buffer-pool reference plus the current root page id,
/// guarded by a single reader-writer lock: lookups and iterator creation
/// take it shared, inserts and removals take it exclusive. All parent/child
/// relationships are page ids stored inside page payloads and resolved
/// through the buffer pool on each touch.
pub struct BPlusTree {
    bpm: Arc<BufferPool>,
    root: RwLock<PageId>,
}

impl BPlusTree {
    /// Wraps an existing tree rooted at `root_page_id`, or an empty tree
    /// when the id is invalid.
    pub fn new(root_page_id: PageId, bpm: Arc<BufferPool>) -> Self {
        Self {
            bpm,
            root: RwLock::new(root_page_id),
        }
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root.read()
    }

    pub fn is_empty(&self) -> bool {
        !self.root.read().is_valid()
    }

    /// Allocates a fresh leaf and makes it the root of a previously empty
    /// tree.
    pub fn start_new_tree(&self) -> Result<()> {
        let mut root = self.root.write();
        self.start_new_tree_locked(&mut root)?;
        Ok(())
    }

    fn start_new_tree_locked(&self, root: &mut PageId) -> Result<PageId> {
        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        NodeMut::new(guard.data_mut()).init(page_id, NodeKind::Leaf, PageId::new(0));
        *root = page_id;
        Ok(page_id)
    }

    /// Point lookup. Returns the stored value with trailing zero padding
    /// trimmed, or `None` when the key is absent.
    pub fn get(&self, key: i64) -> Result<Option<Vec<u8>>> {
        let root = self.root.read();
        if !root.is_valid() {
            return Ok(None);
        }

        let leaf_id = self.find_leaf(*root, key)?;
        let guard = self.bpm.fetch_read(leaf_id)?;
        let node = NodeRef::new(guard.data());

        match node.position_of(key) {
            Some(index) => {
                let value = node.value(index);
                let trimmed = value.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                Ok(Some(value[..trimmed].to_vec()))
            }
            None => Ok(None),
        }
    }

    /// Descends from `root` to the leaf covering `key`, unpinning each
    /// internal page as soon as its child is chosen. At every internal node
    /// the child taken is the one at the largest slot whose key does not
    /// exceed the search key, or slot 0 when every key exceeds it.
    fn find_leaf(&self, root: PageId, key: i64) -> Result<PageId> {
        let mut current = root;
        loop {
            let guard = self.bpm.fetch_read(current)?;
            let node = NodeRef::new(guard.data());
            if node.is_leaf() {
                return Ok(current);
            }

            let mut child = node.child(0);
            for i in (0..node.count()).rev() {
                if node.key(i) <= key {
                    child = node.child(i);
                    break;
                }
            }
            current = child;
        }
    }

    /// Inserts a key/value pair. Returns false when the key already exists
    /// (the stored value is not overwritten). Values longer than the fixed
    /// slot width are rejected.
    pub fn insert(&self, key: i64, value: &[u8]) -> Result<bool> {
        if value.len() > VALUE_SIZE {
            return Err(DbError::ValueTooLarge {
                len: value.len(),
                max: VALUE_SIZE,
            });
        }

        let mut root = self.root.write();

        if !root.is_valid() {
            let page_id = self.start_new_tree_locked(&mut root)?;
            let mut guard = self.bpm.fetch_write(page_id)?;
            NodeMut::new(guard.data_mut()).insert_into_leaf(key, value);
            return Ok(true);
        }

        let leaf_id = self.find_leaf(*root, key)?;
        let mut leaf_guard = self.bpm.fetch_write(leaf_id)?;

        if !NodeRef::new(leaf_guard.data()).is_full() {
            let inserted = NodeMut::new(leaf_guard.data_mut()).insert_into_leaf(key, value);
            return Ok(inserted);
        }

        // A full leaf must not be split for a key it already holds.
        if NodeRef::new(leaf_guard.data()).position_of(key).is_some() {
            return Ok(false);
        }

        let mut sibling_guard = self.bpm.new_page()?;
        let sibling_id = sibling_guard.page_id();
        debug!("splitting leaf {leaf_id} into sibling {sibling_id}");

        let mut leaf = NodeMut::new(leaf_guard.data_mut());
        let mut sibling = NodeMut::new(sibling_guard.data_mut());

        sibling.init(sibling_id, NodeKind::Leaf, leaf.parent_id());
        sibling.set_next_page_id(leaf.next_page_id());
        leaf.set_next_page_id(Some(sibling_id));

        leaf.move_half_to(&mut sibling);

        if key >= sibling.key(0) {
            sibling.insert_into_leaf(key, value);
        } else {
            leaf.insert_into_leaf(key, value);
        }

        let split_key = sibling.key(0);
        self.insert_into_parent(&mut leaf, split_key, &mut sibling, &mut root)?;
        Ok(true)
    }

    /// Links a freshly split-off node into the tree: `old` kept the lower
    /// half, `new` holds the upper half whose least key is `split_key`.
    /// Splits the parent in turn when it is full, recursing upward.
    fn insert_into_parent(
        &self,
        old: &mut NodeMut<'_>,
        split_key: i64,
        new: &mut NodeMut<'_>,
        root: &mut PageId,
    ) -> Result<()> {
        if old.page_id() == *root {
            let mut root_guard = self.bpm.new_page()?;
            let root_id = root_guard.page_id();
            let mut root_node = NodeMut::new(root_guard.data_mut());

            root_node.init(root_id, NodeKind::Internal, PageId::new(0));
            root_node.set_count(2);
            root_node.set_key(0, old.key(0));
            root_node.set_child(0, old.page_id());
            root_node.set_key(1, split_key);
            root_node.set_child(1, new.page_id());

            old.set_parent_id(root_id);
            new.set_parent_id(root_id);
            *root = root_id;
            debug!("grew new root {root_id}");
            return Ok(());
        }

        let parent_id = old.parent_id();
        let mut parent_guard = self.bpm.fetch_write(parent_id)?;

        if !NodeRef::new(parent_guard.data()).is_full() {
            NodeMut::new(parent_guard.data_mut()).insert_into_internal(split_key, new.page_id());
            return Ok(());
        }

        // Parent overflows as well; split it and push the separator up.
        let mut psib_guard = self.bpm.new_page()?;
        let psib_id = psib_guard.page_id();
        debug!("splitting internal {parent_id} into sibling {psib_id}");

        let mut parent = NodeMut::new(parent_guard.data_mut());
        let mut psib = NodeMut::new(psib_guard.data_mut());

        psib.init(psib_id, NodeKind::Internal, parent.parent_id());
        parent.move_half_to(&mut psib);

        // Children whose pointer moved now live under the sibling. The one
        // page already write-locked in this call chain is `old`; reparent it
        // directly instead of re-fetching.
        for i in 0..psib.count() {
            let child_id = psib.child(i);
            if child_id == old.page_id() {
                old.set_parent_id(psib_id);
            } else {
                let mut child_guard = self.bpm.fetch_write(child_id)?;
                NodeMut::new(child_guard.data_mut()).set_parent_id(psib_id);
            }
        }

        if split_key >= psib.key(0) {
            psib.insert_into_internal(split_key, new.page_id());
            new.set_parent_id(psib_id);
        } else {
            parent.insert_into_internal(split_key, new.page_id());
        }

        let new_split_key = psib.key(0);
        self.insert_into_parent(&mut parent, new_split_key, &mut psib, root)
    }

    /// Removes a key. Returns false when the key is absent. Underflowing
    /// nodes borrow from or merge with a sibling, recursing upward when the
    /// parent underflows in turn.
    pub fn remove(&self, key: i64) -> Result<bool> {
        let mut root = self.root.write();
        if !root.is_valid() {
            return Ok(false);
        }

        let leaf_id = self.find_leaf(*root, key)?;
        let mut leaf_guard = self.bpm.fetch_write(leaf_id)?;

        let Some(index) = NodeRef::new(leaf_guard.data()).position_of(key) else {
            return Ok(false);
        };
        NodeMut::new(leaf_guard.data_mut()).remove_at(index);

        if leaf_id == *root {
            // A root leaf may underflow freely; it is only retired once
            // empty.
            if NodeRef::new(leaf_guard.data()).count() == 0 {
                *root = INVALID_PAGE_ID;
                drop(leaf_guard);
                self.bpm.delete_page(leaf_id);
            }
            return Ok(true);
        }

        let underflow = {
            let node = NodeRef::new(leaf_guard.data());
            node.count() < node.min_degree()
        };
        if underflow {
            self.coalesce_or_redistribute(leaf_guard, &mut root)?;
        }
        Ok(true)
    }

    /// Restores the minimum-occupancy invariant for an underflowing node:
    /// borrows one slot from a sibling with spare capacity, or merges with
    /// it otherwise. The caller passes the node's write guard; all guards
    /// for this level are dropped before any upward recursion.
    fn coalesce_or_redistribute(
        &self,
        mut node_guard: PageWriteGuard,
        root: &mut PageId,
    ) -> Result<()> {
        let node_id = node_guard.page_id();
        if node_id == *root {
            return self.adjust_root(node_guard, root);
        }

        let parent_id = NodeRef::new(node_guard.data()).parent_id();
        let mut parent_guard = self.bpm.fetch_write(parent_id)?;

        let node_index = {
            let parent = NodeRef::new(parent_guard.data());
            (0..parent.count())
                .find(|&i| parent.child(i) == node_id)
                .ok_or_else(|| {
                    DbError::TreeCorrupted(format!(
                        "node {node_id} missing from parent {parent_id}"
                    ))
                })?
        };

        // Prefer the left sibling; only the leftmost child borrows from the
        // right.
        let sibling_index = if node_index > 0 {
            node_index - 1
        } else {
            node_index + 1
        };
        let sibling_id = NodeRef::new(parent_guard.data()).child(sibling_index);
        let mut sibling_guard = self.bpm.fetch_write(sibling_id)?;

        let sibling_has_spare = {
            let sibling = NodeRef::new(sibling_guard.data());
            sibling.count() > sibling.min_degree()
        };

        if sibling_has_spare {
            let from_left = sibling_index < node_index;
            let mut node = NodeMut::new(node_guard.data_mut());
            let mut sibling = NodeMut::new(sibling_guard.data_mut());
            let mut parent = NodeMut::new(parent_guard.data_mut());

            if from_left {
                sibling.move_last_to_front_of(&mut node);
                parent.set_key(node_index, node.key(0));
                if !node.is_leaf() {
                    let migrated = node.child(0);
                    let mut child_guard = self.bpm.fetch_write(migrated)?;
                    NodeMut::new(child_guard.data_mut()).set_parent_id(node_id);
                }
            } else {
                sibling.move_first_to_end_of(&mut node);
                parent.set_key(node_index + 1, sibling.key(0));
                if !node.is_leaf() {
                    let migrated = node.child(node.count() - 1);
                    let mut child_guard = self.bpm.fetch_write(migrated)?;
                    NodeMut::new(child_guard.data_mut()).set_parent_id(node_id);
                }
            }
            return Ok(());
        }

        // Merge the right partner into the left one.
        let (mut left_guard, mut right_guard, right_index) = if sibling_index < node_index {
            (sibling_guard, node_guard, node_index)
        } else {
            (node_guard, sibling_guard, sibling_index)
        };
        let right_id = right_guard.page_id();
        debug!("coalescing {right_id} into {}", left_guard.page_id());

        {
            let mut left = NodeMut::new(left_guard.data_mut());
            let mut right = NodeMut::new(right_guard.data_mut());
            let migrated_from = left.count();
            let left_id = left.page_id();

            right.move_all_to(&mut left);

            if left.is_leaf() {
                left.set_next_page_id(right.next_page_id());
            } else {
                for i in migrated_from..left.count() {
                    let child_id = left.child(i);
                    let mut child_guard = self.bpm.fetch_write(child_id)?;
                    NodeMut::new(child_guard.data_mut()).set_parent_id(left_id);
                }
            }

            NodeMut::new(parent_guard.data_mut()).remove_at(right_index);
        }

        drop(left_guard);
        drop(right_guard);
        self.bpm.delete_page(right_id);

        let parent_underflow = {
            let parent = NodeRef::new(parent_guard.data());
            parent.count() < parent.min_degree()
        };
        if parent_underflow {
            return self.coalesce_or_redistribute(parent_guard, root);
        }
        Ok(())
    }

    /// Shrinks the tree at the top: an empty leaf root retires the tree, an
    /// internal root left with a single child hands the root over to that
    /// child.
    fn adjust_root(&self, node_guard: PageWriteGuard, root: &mut PageId) -> Result<()> {
        let node_id = node_guard.page_id();
        let (is_leaf, count) = {
            let node = NodeRef::new(node_guard.data());
            (node.is_leaf(), node.count())
        };

        if is_leaf && count == 0 {
            *root = INVALID_PAGE_ID;
            drop(node_guard);
            self.bpm.delete_page(node_id);
            debug!("tree emptied, root {node_id} retired");
        } else if !is_leaf && count == 1 {
            let child_id = NodeRef::new(node_guard.data()).child(0);
            {
                let mut child_guard = self.bpm.fetch_write(child_id)?;
                NodeMut::new(child_guard.data_mut()).set_parent_id(PageId::new(0));
            }
            *root = child_id;
            drop(node_guard);
            self.bpm.delete_page(node_id);
            debug!("root collapsed into child {child_id}");
        }
        Ok(())
    }

    /// Positions an iterator at the leftmost leaf. Returns `None` for an
    /// empty tree. The iterator keeps exactly one leaf pinned at a time;
    /// it does not hold the tree latch between calls, so iteration is not
    /// safe against concurrent structural mutation.
    pub fn begin(&self) -> Result<Option<TreeIterator>> {
        let root = self.root.read();
        if !root.is_valid() {
            return Ok(None);
        }

        let mut current = *root;
        loop {
            let guard = self.bpm.fetch_read(current)?;
            let next = {
                let node = NodeRef::new(guard.data());
                if node.is_leaf() {
                    None
                } else {
                    Some(node.child(0))
                }
            };
            match next {
                None => return Ok(Some(TreeIterator::new(Arc::clone(&self.bpm), guard))),
                Some(child) => current = child,
            }
        }
    }
}
