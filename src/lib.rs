//! pagedb - an embeddable single-node relational store.
//!
//! Ordered key/value data lives in fixed-size pages on a local file and is
//! served to clients over a line-oriented TCP protocol. The storage kernel
//! is built from three layers:
//!
//! - **Disk manager** (`storage::disk`): translates page ids to file
//!   offsets, reads and writes whole pages, hands out fresh ids.
//! - **Buffer pool** (`buffer`): caches a fixed number of pages in memory
//!   with reference-count pinning, sticky dirty bits and LRU eviction;
//!   access is scoped through RAII page guards.
//! - **B+ tree** (`index`): a disk-resident ordered index from i64 keys to
//!   fixed-width byte values, splitting on overflow, redistributing or
//!   coalescing on underflow, with a leaf-chain iterator.
//!
//! On top of the kernel sit thin wrappers: a JSON table catalog
//! (`catalog`), the query engine and per-connection sessions (`engine`),
//! the command grammar (`parser`) and the TCP server loop (`server`).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagedb::buffer::BufferPool;
//! use pagedb::index::BPlusTree;
//! use pagedb::storage::disk::DiskManager;
//! use pagedb::common::INVALID_PAGE_ID;
//!
//! let disk = Arc::new(DiskManager::open("example.db").unwrap());
//! let pool = Arc::new(BufferPool::new(100, disk));
//!
//! let tree = BPlusTree::new(INVALID_PAGE_ID, pool);
//! tree.insert(1, b"hello").unwrap();
//! assert_eq!(tree.get(1).unwrap(), Some(b"hello".to_vec()));
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod engine;
pub mod index;
pub mod parser;
pub mod server;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{DbError, FrameId, PageId, Result};
