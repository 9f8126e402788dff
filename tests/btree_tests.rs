//! Tests for the B-tree engine
//!
//! These tests verify:
//! - Point operations (put/get/remove/contains)
//! - Structural invariants under insert workloads
//! - Ordered forward/reverse traversal
//! - Range selection
//! - Clear/destroy residue behavior

use canopykv::{BTree, BTreeConfig, MemoryNodeStore};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

// =============================================================================
// Helper Functions
// =============================================================================

fn tree_with(min_data: usize) -> BTree<MemoryNodeStore<u32, String>> {
    let store = MemoryNodeStore::new();
    let config = BTreeConfig::builder().min_data(min_data).build();
    BTree::with_config(&1, store, config).unwrap()
}

fn shuffled(range: std::ops::Range<u32>, seed: u64) -> Vec<u32> {
    let mut keys: Vec<u32> = range.collect();
    let mut rng = StdRng::seed_from_u64(seed);
    keys.shuffle(&mut rng);
    keys
}

fn collected_keys(tree: &BTree<MemoryNodeStore<u32, String>>) -> Vec<u32> {
    tree.keys()
        .unwrap()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap()
}

// =============================================================================
// Point Operations
// =============================================================================

#[test]
fn test_put_get_roundtrip() {
    let tree = tree_with(10);

    assert!(tree.put(42, "answer".to_string()).unwrap().is_none());
    assert_eq!(tree.get(&42).unwrap(), Some("answer".to_string()));
    assert_eq!(tree.get(&7).unwrap(), None);
    assert!(tree.contains_key(&42).unwrap());
    assert!(!tree.contains_key(&7).unwrap());
}

#[test]
fn test_put_overwrites_in_place() {
    let tree = tree_with(10);

    assert!(tree.put(5, "first".to_string()).unwrap().is_none());
    let old = tree.put(5, "second".to_string()).unwrap();
    assert_eq!(old, Some("first".to_string()));
    assert_eq!(tree.get(&5).unwrap(), Some("second".to_string()));

    // Overwriting never changes the size.
    assert_eq!(tree.len().unwrap(), 1);
}

#[test]
fn test_remove_missing_key_is_noop() {
    let tree = tree_with(10);

    tree.put(1, "one".to_string()).unwrap();
    assert_eq!(tree.remove(&99).unwrap(), None);
    assert_eq!(tree.len().unwrap(), 1);
}

#[test]
fn test_put_remove_few() {
    let tree = tree_with(10);

    for i in 0..3 {
        tree.put(i, "hi".to_string()).unwrap();
    }
    for i in 0..3 {
        assert_eq!(tree.remove(&i).unwrap(), Some("hi".to_string()));
    }

    assert!(tree.is_empty().unwrap());
    tree.destroy().unwrap();
}

#[test]
fn test_thin_tree_insert_and_drain() {
    // min_data = 1 forces constant splitting and merging.
    let tree = tree_with(1);
    let keys = shuffled(0..100, 7);

    for &k in &keys {
        tree.put(k, "hi".to_string()).unwrap();
    }
    assert_eq!(tree.len().unwrap(), 100);

    for &k in &keys {
        assert_eq!(tree.remove(&k).unwrap(), Some("hi".to_string()));
    }
    assert_eq!(tree.len().unwrap(), 0);

    tree.destroy().unwrap();
    assert_eq!(tree.store().node_count(), 0);
    assert_eq!(tree.store().value_count(), 0);
}

#[test]
fn test_wide_tree_insert_and_drain() {
    let tree = tree_with(10);
    let keys = shuffled(0..100, 11);

    for &k in &keys {
        tree.put(k, "hi".to_string()).unwrap();
    }
    for &k in &keys {
        assert!(tree.remove(&k).unwrap().is_some());
    }

    assert!(tree.is_empty().unwrap());
}

// =============================================================================
// Size Consistency
// =============================================================================

#[test]
fn test_size_tracks_inserts_and_removes() {
    let tree = tree_with(2);
    let keys = shuffled(0..60, 3);

    for &k in &keys {
        tree.put(k, format!("v{}", k)).unwrap();
    }
    assert_eq!(tree.len().unwrap(), 60);

    for &k in &keys[..25] {
        tree.remove(&k).unwrap();
    }
    assert_eq!(tree.len().unwrap(), 35);

    // Duplicate puts and repeated removes change nothing.
    tree.put(keys[30], "again".to_string()).unwrap();
    tree.remove(&keys[0]).unwrap();
    assert_eq!(tree.len().unwrap(), 35);
}

// =============================================================================
// Traversal
// =============================================================================

#[test]
fn test_iteration_is_sorted_and_exhausts() {
    let tree = tree_with(2);
    let keys = shuffled(0..50, 99);

    for &k in &keys {
        tree.put(k, format!("v{}", k)).unwrap();
    }

    let forward = collected_keys(&tree);
    assert_eq!(forward, (0..50).collect::<Vec<_>>());

    let backward: Vec<u32> = tree
        .keys_rev()
        .unwrap()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(backward, (0..50).rev().collect::<Vec<_>>());
}

#[test]
fn test_iteration_of_empty_tree_yields_nothing() {
    let tree = tree_with(2);
    assert_eq!(collected_keys(&tree), Vec::<u32>::new());
    assert_eq!(tree.keys_rev().unwrap().count(), 0);
}

#[test]
fn test_entries_pair_keys_with_values() {
    let tree = tree_with(2);
    for k in [3u32, 1, 2] {
        tree.put(k, format!("v{}", k)).unwrap();
    }

    let entries: Vec<(u32, String)> = tree
        .iter()
        .unwrap()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(
        entries,
        vec![
            (1, "v1".to_string()),
            (2, "v2".to_string()),
            (3, "v3".to_string())
        ]
    );

    let values: Vec<String> = tree
        .values()
        .unwrap()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(values, vec!["v1", "v2", "v3"]);
}

#[test]
fn test_contains_value_scans() {
    let tree = tree_with(2);
    tree.put(1, "one".to_string()).unwrap();
    tree.put(2, "two".to_string()).unwrap();

    assert!(tree.contains_value(&"two".to_string()).unwrap());
    assert!(!tree.contains_value(&"three".to_string()).unwrap());
}

#[test]
fn test_extend_bulk_inserts() {
    let tree = tree_with(2);
    tree.extend((0..20).map(|k| (k, format!("v{}", k)))).unwrap();

    assert_eq!(tree.len().unwrap(), 20);
    assert_eq!(collected_keys(&tree), (0..20).collect::<Vec<_>>());
}

// =============================================================================
// Range Selection
// =============================================================================

#[test]
fn test_select_between_dense_keys() {
    let tree = tree_with(1);
    for i in 0..100 {
        tree.put(10000 + i, "hi".to_string()).unwrap();
    }

    let selection = tree.select(&10003, &10004).unwrap();
    let picked: Vec<u32> = selection
        .iter()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(picked, vec![10003]);
}

#[test]
fn test_select_between_sparse_keys() {
    let tree = tree_with(1);
    for k in [10001u32, 10002, 10004, 10006, 10009] {
        tree.put(k, "hi".to_string()).unwrap();
    }

    // Neither bound is present; the range is half-open.
    let selection = tree.select(&10003, &10005).unwrap();
    let picked: Vec<u32> = selection
        .iter()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(picked, vec![10004]);
}

#[test]
fn test_select_is_restartable() {
    let tree = tree_with(2);
    for k in 0..30 {
        tree.put(k, "x".to_string()).unwrap();
    }

    let selection = tree.select(&10, &15).unwrap();
    let first: Vec<u32> = selection
        .iter()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    let second: Vec<u32> = selection
        .iter()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(first, vec![10, 11, 12, 13, 14]);
    assert_eq!(first, second);
}

// =============================================================================
// Structural Invariants
// =============================================================================

#[test]
fn test_occupancy_bounds_hold_after_inserts() {
    let min_data = 2;
    let tree = tree_with(min_data);
    for &k in &shuffled(0..500, 5) {
        tree.put(k, "x".to_string()).unwrap();
    }

    let mut below_minimum = 0;
    tree.each_depth_first(|node| {
        assert!(node.data().len() <= 2 * min_data + 1);
        if node.data().len() < min_data {
            below_minimum += 1;
        }
        if !node.is_leaf() {
            assert_eq!(node.children().len(), node.data().len() + 1);
        }
        Ok(true)
    })
    .unwrap();

    // Only the root is exempt from the minimum.
    assert!(below_minimum <= 1);
}

#[test]
fn test_depth_first_visit_can_stop_early() {
    let tree = tree_with(1);
    for k in 0..50 {
        tree.put(k, "x".to_string()).unwrap();
    }

    let mut total = 0;
    tree.each_depth_first(|_| {
        total += 1;
        Ok(true)
    })
    .unwrap();

    let mut visited = 0;
    tree.each_depth_first(|_| {
        visited += 1;
        Ok(visited < 2)
    })
    .unwrap();

    assert!(total > 2);
    assert_eq!(visited, 2);
}

// =============================================================================
// Clear / Destroy
// =============================================================================

#[test]
fn test_clear_empties_but_keeps_root() {
    let tree = tree_with(1);
    for k in 0..40 {
        tree.put(k, format!("v{}", k)).unwrap();
    }

    tree.clear().unwrap();

    assert_eq!(tree.len().unwrap(), 0);
    assert_eq!(tree.store().value_count(), 0);
    assert_eq!(tree.store().node_count(), 1);

    // The tree stays usable after a clear.
    tree.put(7, "back".to_string()).unwrap();
    assert_eq!(tree.get(&7).unwrap(), Some("back".to_string()));
}

#[test]
fn test_destroy_leaves_no_residue() {
    let tree = tree_with(1);
    for k in 0..40 {
        tree.put(k, format!("v{}", k)).unwrap();
    }

    tree.destroy().unwrap();

    assert_eq!(tree.store().node_count(), 0);
    assert_eq!(tree.store().value_count(), 0);
}

#[test]
fn test_destroy_of_untouched_tree() {
    let tree = tree_with(2);
    tree.destroy().unwrap();
    assert_eq!(tree.store().node_count(), 0);
}

// =============================================================================
// Reopening
// =============================================================================

#[test]
fn test_reopened_tree_uses_persisted_node_capacity() {
    let store = MemoryNodeStore::new();
    let narrow = BTreeConfig::builder().min_data(1).build();
    let tree = BTree::with_config(&1, &store, narrow).unwrap();
    for k in 0..30u32 {
        tree.put(k, format!("v{}", k)).unwrap();
    }

    // Reopen with a much larger configured order; the persisted root
    // capacity must win so the existing layout stays coherent.
    let wide = BTreeConfig::builder().min_data(50).build();
    let reopened = BTree::with_config(&1, &store, wide).unwrap();

    assert_eq!(reopened.len().unwrap(), 30);
    reopened.put(77, "new".to_string()).unwrap();
    reopened.remove(&3).unwrap();

    let keys: Vec<u32> = reopened
        .keys()
        .unwrap()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    let mut expected: Vec<u32> = (0..30).filter(|k| *k != 3).collect();
    expected.push(77);
    assert_eq!(keys, expected);
}
