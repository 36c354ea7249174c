//! Disk-resident B+ tree index over buffer-pool pages.

mod bptree;
mod iterator;
mod node;

pub use bptree::BPlusTree;
pub use iterator::TreeIterator;
pub use node::{NodeKind, NodeMut, NodeRef, HEADER_SIZE, MAX_DEGREE, VALUE_SIZE};
