//! Tests for the transactional storage wrapper
//!
//! These tests verify:
//! - Write buffering and coalescing
//! - Read-your-writes and read-your-deletes
//! - Ordered replay on commit, rollback discard
//! - Sub-transaction merging
//! - Scoped commit-once semantics
//! - Data structures layered over a transaction

use std::sync::atomic::{AtomicUsize, Ordering};

use canopykv::{
    BTree, BTreeConfig, CanopyError, MemoryNodeStore, Node, NodeStore, PagedList,
    PagedListConfig, Transaction,
};

// =============================================================================
// Counting Store (test double at the storage seam)
// =============================================================================

/// Delegates to an inner store while counting the calls that reach it.
struct CountingStore<S: NodeStore> {
    inner: S,
    load_value_calls: AtomicUsize,
    store_value_calls: AtomicUsize,
    load_node_calls: AtomicUsize,
    store_node_calls: AtomicUsize,
    remove_value_calls: AtomicUsize,
    remove_node_calls: AtomicUsize,
}

impl<S: NodeStore> CountingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            load_value_calls: AtomicUsize::new(0),
            store_value_calls: AtomicUsize::new(0),
            load_node_calls: AtomicUsize::new(0),
            store_node_calls: AtomicUsize::new(0),
            remove_value_calls: AtomicUsize::new(0),
            remove_node_calls: AtomicUsize::new(0),
        }
    }

    fn store_value_calls(&self) -> usize {
        self.store_value_calls.load(Ordering::Relaxed)
    }

    fn load_value_calls(&self) -> usize {
        self.load_value_calls.load(Ordering::Relaxed)
    }

    fn writes(&self) -> usize {
        self.store_value_calls.load(Ordering::Relaxed)
            + self.store_node_calls.load(Ordering::Relaxed)
            + self.remove_value_calls.load(Ordering::Relaxed)
            + self.remove_node_calls.load(Ordering::Relaxed)
    }
}

impl<S: NodeStore> NodeStore for CountingStore<S> {
    type UserKey = S::UserKey;
    type StoreKey = S::StoreKey;
    type Value = S::Value;

    fn load_value(&self, key: &Self::StoreKey) -> canopykv::Result<Option<Self::Value>> {
        self.load_value_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.load_value(key)
    }

    fn load_node(
        &self,
        key: &Self::StoreKey,
    ) -> canopykv::Result<Node<Self::UserKey, Self::StoreKey>> {
        self.load_node_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.load_node(key)
    }

    fn store_value(&self, key: &Self::StoreKey, value: Self::Value) -> canopykv::Result<()> {
        self.store_value_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.store_value(key, value)
    }

    fn store_node(
        &self,
        key: &Self::StoreKey,
        node: Node<Self::UserKey, Self::StoreKey>,
    ) -> canopykv::Result<()> {
        self.store_node_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.store_node(key, node)
    }

    fn remove_node(&self, key: &Self::StoreKey) -> canopykv::Result<()> {
        self.remove_node_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.remove_node(key)
    }

    fn remove_value(&self, key: &Self::StoreKey) -> canopykv::Result<()> {
        self.remove_value_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.remove_value(key)
    }

    fn generate_key(
        &self,
        node: Option<&Node<Self::UserKey, Self::StoreKey>>,
        value: Option<&Self::Value>,
    ) -> canopykv::Result<Self::StoreKey> {
        self.inner.generate_key(node, value)
    }

    fn convert(&self, key: &Self::UserKey) -> canopykv::Result<Self::StoreKey> {
        self.inner.convert(key)
    }
}

fn counting_store() -> CountingStore<MemoryNodeStore<u32, String>> {
    CountingStore::new(MemoryNodeStore::new())
}

// =============================================================================
// Coalescing
// =============================================================================

#[test]
fn test_superseded_write_never_reaches_the_store() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();

    tx.store_value(&key, "first".to_string()).unwrap();
    tx.store_value(&key, "second".to_string()).unwrap();
    tx.commit().unwrap();

    assert_eq!(store.store_value_calls(), 1);
    assert_eq!(
        store.inner.load_value(&key).unwrap(),
        Some("second".to_string())
    );
}

#[test]
fn test_store_then_remove_coalesces_to_remove() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();

    tx.store_value(&key, "doomed".to_string()).unwrap();
    tx.remove_value(&key).unwrap();
    tx.commit().unwrap();

    assert_eq!(store.store_value_calls(), 0);
    assert_eq!(store.inner.load_value(&key).unwrap(), None);
}

#[test]
fn test_remove_then_store_leaves_the_value() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();
    store.inner.store_value(&key, "old".to_string()).unwrap();

    tx.remove_value(&key).unwrap();
    tx.store_value(&key, "new".to_string()).unwrap();
    tx.commit().unwrap();

    assert_eq!(
        store.inner.load_value(&key).unwrap(),
        Some("new".to_string())
    );
}

// =============================================================================
// Read-your-writes
// =============================================================================

#[test]
fn test_buffered_write_is_readable_without_touching_the_store() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();

    tx.store_value(&key, "pending".to_string()).unwrap();
    assert_eq!(tx.load_value(&key).unwrap(), Some("pending".to_string()));

    assert_eq!(store.load_value_calls(), 0);
    assert_eq!(store.writes(), 0);
}

#[test]
fn test_buffered_node_remove_reads_as_not_found() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "n-1".to_string();
    store.inner.store_node(&key, Node::new(2, 1, 0)).unwrap();

    tx.remove_node(&key).unwrap();
    let err = tx.load_node(&key).err().expect("node must read as removed");
    assert!(matches!(err, CanopyError::NodeNotFound(_)));
}

#[test]
fn test_buffered_value_remove_reads_as_absent() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();
    store.inner.store_value(&key, "old".to_string()).unwrap();

    tx.remove_value(&key).unwrap();
    assert_eq!(tx.load_value(&key).unwrap(), None);
}

#[test]
fn test_fallthrough_reads_are_cached() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();
    store.inner.store_value(&key, "shared".to_string()).unwrap();

    assert_eq!(tx.load_value(&key).unwrap(), Some("shared".to_string()));
    assert_eq!(tx.load_value(&key).unwrap(), Some("shared".to_string()));
    assert_eq!(store.load_value_calls(), 1);

    // Absent results are cached too.
    let missing = "u-2".to_string();
    assert_eq!(tx.load_value(&missing).unwrap(), None);
    assert_eq!(tx.load_value(&missing).unwrap(), None);
    assert_eq!(store.load_value_calls(), 2);
}

// =============================================================================
// Commit / Rollback
// =============================================================================

#[test]
fn test_nothing_reaches_the_store_before_commit() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    tx.store_value(&"u-1".to_string(), "a".to_string()).unwrap();
    tx.store_node(&"n-1".to_string(), Node::new(2, 1, 0)).unwrap();
    tx.remove_value(&"u-2".to_string()).unwrap();

    assert_eq!(store.writes(), 0);
    tx.commit().unwrap();
    assert_eq!(store.writes(), 3);
}

#[test]
fn test_commit_clears_buffers_for_reuse() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    tx.store_value(&"u-1".to_string(), "a".to_string()).unwrap();
    tx.commit().unwrap();
    assert_eq!(tx.pending_operations(), 0);

    tx.store_value(&"u-2".to_string(), "b".to_string()).unwrap();
    tx.commit().unwrap();

    assert_eq!(
        store.inner.load_value(&"u-2".to_string()).unwrap(),
        Some("b".to_string())
    );
}

#[test]
fn test_rollback_discards_everything() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    tx.store_value(&"u-1".to_string(), "a".to_string()).unwrap();
    tx.remove_node(&"n-1".to_string()).unwrap();
    tx.rollback();
    tx.commit().unwrap();

    assert_eq!(store.writes(), 0);
    assert_eq!(store.inner.load_value(&"u-1".to_string()).unwrap(), None);
}

// =============================================================================
// Sub-transactions
// =============================================================================

#[test]
fn test_sub_transaction_merges_into_parent() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();

    tx.sub_transaction(|child| {
        child.store_value(&key, "from-child".to_string())?;
        // The child sees the parent's buffered state transitively.
        Ok(())
    })
    .unwrap();

    // The merged write is readable from the parent and commits once.
    assert_eq!(tx.load_value(&key).unwrap(), Some("from-child".to_string()));
    assert_eq!(store.writes(), 0);

    tx.commit().unwrap();
    assert_eq!(
        store.inner.load_value(&key).unwrap(),
        Some("from-child".to_string())
    );
}

#[test]
fn test_sub_transaction_sees_parent_buffer() {
    let store = counting_store();
    let tx = Transaction::new(&store);
    let key = "u-1".to_string();
    tx.store_value(&key, "parent".to_string()).unwrap();

    tx.sub_transaction(|child| {
        assert_eq!(child.load_value(&key)?, Some("parent".to_string()));
        Ok(())
    })
    .unwrap();

    assert_eq!(store.load_value_calls(), 0);
}

#[test]
fn test_failed_sub_transaction_is_discarded() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    let result: canopykv::Result<()> = tx.sub_transaction(|child| {
        child.store_value(&"u-1".to_string(), "doomed".to_string())?;
        Err(CanopyError::Storage("forced failure".to_string()))
    });
    assert!(result.is_err());

    tx.commit().unwrap();
    assert_eq!(store.writes(), 0);
}

// =============================================================================
// Scopes
// =============================================================================

#[test]
fn test_scope_commits_exactly_once_at_outermost_exit() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    tx.scope(|tx| {
        tx.store_value(&"u-1".to_string(), "a".to_string())?;

        tx.scope(|tx| {
            tx.store_value(&"u-2".to_string(), "b".to_string())?;
            Ok(())
        })?;

        // The inner scope exit must not have committed anything.
        assert_eq!(store.writes(), 0);
        Ok(())
    })
    .unwrap();

    assert_eq!(store.writes(), 2);
    assert_eq!(tx.pending_operations(), 0);
}

#[test]
fn test_scope_rolls_back_on_error() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    let result: canopykv::Result<()> = tx.scope(|tx| {
        tx.store_value(&"u-1".to_string(), "doomed".to_string())?;
        Err(CanopyError::Storage("forced failure".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(store.writes(), 0);
    assert_eq!(tx.pending_operations(), 0);
}

// =============================================================================
// Structures over a Transaction
// =============================================================================

#[test]
fn test_btree_buffered_through_a_transaction() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    let config = BTreeConfig::builder().min_data(2).build();
    let tree = BTree::with_config(&1, &tx, config).unwrap();
    for k in 0..50u32 {
        tree.put(k, format!("v{}", k)).unwrap();
    }

    // Every structural write is still buffered.
    assert_eq!(store.writes(), 0);
    assert_eq!(store.inner.node_count(), 0);

    tx.commit().unwrap();

    // The committed tree is fully usable through the plain store.
    let reopened = BTree::new(&1, &store.inner).unwrap();
    assert_eq!(reopened.len().unwrap(), 50);
    assert_eq!(reopened.get(&17).unwrap(), Some("v17".to_string()));

    let keys: Vec<u32> = reopened
        .keys()
        .unwrap()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(keys, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_paged_list_buffered_through_a_transaction() {
    let store: MemoryNodeStore<String, String> = MemoryNodeStore::new();
    let tx = Transaction::new(&store);

    let config = PagedListConfig::builder().page_size(3).build();
    let list = PagedList::with_config("head".to_string(), &tx, config);
    for i in 0..20 {
        list.push(i.to_string()).unwrap();
    }

    assert_eq!(store.node_count(), 0);
    assert_eq!(store.value_count(), 0);

    tx.commit().unwrap();

    let reopened = PagedList::new("head".to_string(), &store);
    let values: Vec<String> = reopened
        .iter()
        .unwrap()
        .collect::<canopykv::Result<Vec<_>>>()
        .unwrap();
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(values, expected);
}

#[test]
fn test_tree_mutations_coalesce_node_rewrites() {
    let store = counting_store();
    let tx = Transaction::new(&store);

    let config = BTreeConfig::builder().min_data(4).build();
    let tree = BTree::with_config(&1, &tx, config).unwrap();

    // All inserts land in the root; every rewrite of the root node must
    // coalesce into one store call at commit.
    for k in 0..5u32 {
        tree.put(k, "x".to_string()).unwrap();
    }
    tx.commit().unwrap();

    assert_eq!(store.store_node_calls.load(Ordering::Relaxed), 1);
}
