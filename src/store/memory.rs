//! In-memory NodeStore
//!
//! HashMap-backed reference implementation of the storage contract. Useful
//! as a test backend and as the template for writing real adapters.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{CanopyError, Result};
use crate::node::Node;

use super::NodeStore;

/// An in-memory node store.
///
/// Store keys are strings: `u-{key}` for converted user keys, `n-{seq}` and
/// `v-{seq}` for generated node and value keys. The user key type only needs
/// `Display` to get a deterministic conversion.
pub struct MemoryNodeStore<K, V> {
    nodes: RwLock<HashMap<String, Node<K, String>>>,
    values: RwLock<HashMap<String, V>>,
    key_seq: AtomicU64,
}

impl<K, V> MemoryNodeStore<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            values: RwLock::new(HashMap::new()),
            key_seq: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Introspection (for tests and debugging)
    // =========================================================================

    /// Number of nodes currently resolvable.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Number of values currently resolvable.
    pub fn value_count(&self) -> usize {
        self.values.read().len()
    }
}

impl<K, V> Default for MemoryNodeStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> NodeStore for MemoryNodeStore<K, V>
where
    K: Ord + Clone + Display,
    V: Clone,
{
    type UserKey = K;
    type StoreKey = String;
    type Value = V;

    fn load_value(&self, key: &String) -> Result<Option<V>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn load_node(&self, key: &String) -> Result<Node<K, String>> {
        self.nodes
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CanopyError::NodeNotFound(key.clone()))
    }

    fn store_value(&self, key: &String, value: V) -> Result<()> {
        self.values.write().insert(key.clone(), value);
        Ok(())
    }

    fn store_node(&self, key: &String, node: Node<K, String>) -> Result<()> {
        self.nodes.write().insert(key.clone(), node);
        Ok(())
    }

    fn remove_node(&self, key: &String) -> Result<()> {
        self.nodes.write().remove(key);
        Ok(())
    }

    fn remove_value(&self, key: &String) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn generate_key(&self, node: Option<&Node<K, String>>, _value: Option<&V>) -> Result<String> {
        let seq = self.key_seq.fetch_add(1, Ordering::Relaxed);
        if node.is_some() {
            Ok(format!("n-{:016x}", seq))
        } else {
            Ok(format!("v-{:016x}", seq))
        }
    }

    fn convert(&self, key: &K) -> Result<String> {
        Ok(format!("u-{}", key))
    }
}
