use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::thread_rng;

use pagedb::buffer::BufferPool;
use pagedb::common::{DbError, PageId, INVALID_PAGE_ID};
use pagedb::index::BPlusTree;
use pagedb::storage::disk::DiskManager;

fn create_tree(pool_size: usize) -> (BPlusTree, Arc<BufferPool>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
    let pool = Arc::new(BufferPool::new(pool_size, disk));
    let tree = BPlusTree::new(INVALID_PAGE_ID, Arc::clone(&pool));
    (tree, pool, dir)
}

#[test]
fn test_empty_tree() {
    let (tree, _pool, _dir) = create_tree(10);

    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);
    assert_eq!(tree.get(1).unwrap(), None);
    assert!(!tree.remove(1).unwrap());
    assert!(tree.begin().unwrap().is_none());
}

#[test]
fn test_insert_and_get() {
    let (tree, _pool, _dir) = create_tree(10);

    assert!(tree.insert(10, b"ten").unwrap());
    assert!(tree.insert(5, b"five").unwrap());
    assert!(tree.insert(20, b"twenty").unwrap());

    assert_eq!(tree.get(5).unwrap(), Some(b"five".to_vec()));
    assert_eq!(tree.get(10).unwrap(), Some(b"ten".to_vec()));
    assert_eq!(tree.get(20).unwrap(), Some(b"twenty".to_vec()));
    assert_eq!(tree.get(15).unwrap(), None);
}

#[test]
fn test_duplicate_insert_returns_false() {
    let (tree, _pool, _dir) = create_tree(10);

    assert!(tree.insert(1, b"first").unwrap());
    assert!(!tree.insert(1, b"second").unwrap());
    assert_eq!(tree.get(1).unwrap(), Some(b"first".to_vec()));
}

#[test]
fn test_duplicate_insert_into_full_leaf() {
    let (tree, _pool, _dir) = create_tree(50);

    // Fill exactly one leaf to capacity, then retry a present key.
    for key in 0..28 {
        assert!(tree.insert(key, b"v").unwrap());
    }
    assert!(!tree.insert(13, b"other").unwrap());
    assert_eq!(tree.get(13).unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_oversized_value_rejected() {
    let (tree, _pool, _dir) = create_tree(10);
    let big = [1u8; 129];
    assert!(matches!(
        tree.insert(1, &big),
        Err(DbError::ValueTooLarge { len: 129, max: 128 })
    ));
}

#[test]
fn test_round_trip_random_permutation() {
    let (tree, _pool, _dir) = create_tree(100);

    let mut keys: Vec<i64> = (0..500).collect();
    keys.shuffle(&mut thread_rng());

    for &key in &keys {
        assert!(tree.insert(key, format!("value-{key}").as_bytes()).unwrap());
    }

    for key in 0..500 {
        assert_eq!(
            tree.get(key).unwrap(),
            Some(format!("value-{key}").into_bytes()),
            "key {key} lost"
        );
    }
    assert_eq!(tree.get(500).unwrap(), None);
    assert_eq!(tree.get(-1).unwrap(), None);
}

#[test]
fn test_insert_then_delete_sweep() {
    let (tree, _pool, _dir) = create_tree(50);

    let n = 100;
    for key in 0..n {
        assert!(tree.insert(key, b"val").unwrap());
    }

    for key in 0..n {
        assert!(tree.remove(key).unwrap(), "failed to remove key {key}");
        assert_eq!(tree.get(key).unwrap(), None, "key {key} still present");
    }

    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);
}

#[test]
fn test_delete_descending_order() {
    let (tree, _pool, _dir) = create_tree(50);

    for key in 0..100 {
        tree.insert(key, b"val").unwrap();
    }
    for key in (0..100).rev() {
        assert!(tree.remove(key).unwrap());
    }
    assert!(tree.is_empty());
}

#[test]
fn test_delete_random_order() {
    let (tree, _pool, _dir) = create_tree(50);

    let n = 200;
    for key in 0..n {
        tree.insert(key, b"val").unwrap();
    }

    let mut keys: Vec<i64> = (0..n).collect();
    keys.shuffle(&mut thread_rng());
    for &key in &keys {
        assert!(tree.remove(key).unwrap(), "failed to remove key {key}");
    }

    assert!(tree.is_empty());
    for key in 0..n {
        assert_eq!(tree.get(key).unwrap(), None);
    }
}

#[test]
fn test_remove_missing_key() {
    let (tree, _pool, _dir) = create_tree(10);

    tree.insert(1, b"one").unwrap();
    assert!(!tree.remove(2).unwrap());
    assert_eq!(tree.get(1).unwrap(), Some(b"one".to_vec()));
}

#[test]
fn test_partial_delete_keeps_remainder() {
    let (tree, _pool, _dir) = create_tree(50);

    for key in 0..300 {
        tree.insert(key, format!("v{key}").as_bytes()).unwrap();
    }
    for key in (0..300).step_by(2) {
        assert!(tree.remove(key).unwrap());
    }

    for key in 0..300 {
        let expected = if key % 2 == 0 {
            None
        } else {
            Some(format!("v{key}").into_bytes())
        };
        assert_eq!(tree.get(key).unwrap(), expected, "wrong result for {key}");
    }
}

#[test]
fn test_iterator_visits_keys_in_order() {
    let (tree, _pool, _dir) = create_tree(100);

    let n: i64 = 2000;
    let mut keys: Vec<i64> = (0..n).collect();
    keys.shuffle(&mut thread_rng());

    for &key in &keys {
        let value = (key * 10).to_be_bytes();
        assert!(tree.insert(key, &value).unwrap());
    }

    let iter = tree.begin().unwrap().expect("tree is not empty");
    let mut expected: i64 = 0;
    for entry in iter {
        let (key, value) = entry.unwrap();
        assert_eq!(key, expected, "order broken at {expected}");
        assert_eq!(
            &value[..8],
            &(key * 10).to_be_bytes(),
            "value broken at {key}"
        );
        expected += 1;
    }
    assert_eq!(expected, n, "iterator did not visit all records");
}

#[test]
fn test_iterator_across_splits_small() {
    let (tree, _pool, _dir) = create_tree(20);

    // Enough ascending inserts to force several leaf splits.
    for key in 0..60 {
        tree.insert(key, format!("row-{key}").as_bytes()).unwrap();
    }

    let iter = tree.begin().unwrap().unwrap();
    let collected: Vec<i64> = iter.map(|e| e.unwrap().0).collect();
    let expected: Vec<i64> = (0..60).collect();
    assert_eq!(collected, expected);
}

#[test]
fn test_pin_discipline_after_operations() {
    let (tree, pool, _dir) = create_tree(50);

    for key in 0..300 {
        tree.insert(key, b"x").unwrap();
    }
    for key in 100..200 {
        tree.remove(key).unwrap();
    }
    tree.get(42).unwrap();
    let mut iter = tree.begin().unwrap().unwrap();
    while iter.next_entry().unwrap().is_some() {}
    drop(iter);

    // Every page ever allocated is either evicted or resident with no pins.
    for raw in 0..pool.disk().num_pages() {
        let count = pool.pin_count(PageId::new(raw));
        assert!(
            count.is_none() || count == Some(0),
            "page {raw} leaked a pin: {count:?}"
        );
    }
}

#[test]
fn test_closed_iterator_releases_pin() {
    let (tree, pool, _dir) = create_tree(10);

    tree.insert(1, b"one").unwrap();
    let root = tree.root_page_id();

    let mut iter = tree.begin().unwrap().unwrap();
    assert_eq!(pool.pin_count(root), Some(1));
    iter.close();
    assert_eq!(pool.pin_count(root), Some(0));
}

#[test]
fn test_root_id_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    let root = {
        let disk = Arc::new(DiskManager::open(&path).unwrap());
        let pool = Arc::new(BufferPool::new(50, disk));
        let tree = BPlusTree::new(INVALID_PAGE_ID, Arc::clone(&pool));
        for key in 0..200 {
            tree.insert(key, format!("persisted-{key}").as_bytes())
                .unwrap();
        }
        pool.flush_all().unwrap();
        tree.root_page_id()
    };

    let disk = Arc::new(DiskManager::open(&path).unwrap());
    let pool = Arc::new(BufferPool::new(50, disk));
    let tree = BPlusTree::new(root, pool);
    for key in 0..200 {
        assert_eq!(
            tree.get(key).unwrap(),
            Some(format!("persisted-{key}").into_bytes())
        );
    }
}

#[test]
fn test_bulk_insert_and_read_back() {
    let (tree, _pool, _dir) = create_tree(1000);

    let n: i64 = 10_000;
    for key in 0..n {
        let value = format!("data-{key:095}");
        assert!(tree.insert(key, value.as_bytes()).unwrap());
    }

    for key in 0..n {
        let value = tree.get(key).unwrap();
        assert!(
            value.as_ref().is_some_and(|v| !v.is_empty()),
            "key {key} lost"
        );
    }
}
