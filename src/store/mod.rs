//! Storage Module
//!
//! The storage abstraction consumed by every data structure in this crate,
//! plus the bundled backends.
//!
//! ## Responsibilities
//! - Define the six-operation contract between the engines and a backend
//! - Keep structural absence (`load_node`) distinct from value absence
//!   (`load_value`)
//! - Provide the reference in-memory backend and a flat-directory
//!   filesystem backend
//!
//! Retry policy, timeouts, and durability all belong to backend
//! implementations; the engines above this trait never retry.

mod directory;
mod memory;

pub use directory::DirectoryNodeStore;
pub use memory::MemoryNodeStore;

use std::hash::Hash;

use crate::error::Result;
use crate::node::Node;

/// The bridge between the pointer-based data structures and whatever medium
/// actually holds their nodes and values.
///
/// Implementors do most of what a DAO would, plus two things a DAO would
/// not expose: [`NodeStore::convert`], a pure function from user keys to
/// store keys, and [`NodeStore::generate_key`], which must never repeat.
///
/// All methods take `&self`; backends that buffer or cache use interior
/// mutability.
pub trait NodeStore {
    /// The caller-facing key type.
    type UserKey: Ord + Clone;

    /// The key type the storage medium addresses nodes and values by.
    type StoreKey: Eq + Hash + Clone;

    /// The user value type.
    type Value: Clone;

    /// Load a user value. Absence is an ordinary `Ok(None)`, never an error.
    fn load_value(&self, key: &Self::StoreKey) -> Result<Option<Self::Value>>;

    /// Load a structural node. Absence is a fatal
    /// [`crate::CanopyError::NodeNotFound`]: a missing node means the
    /// structure is corrupt or was destroyed underneath us.
    fn load_node(&self, key: &Self::StoreKey) -> Result<Node<Self::UserKey, Self::StoreKey>>;

    /// Store a user value. Replaces any value already at the key.
    fn store_value(&self, key: &Self::StoreKey, value: Self::Value) -> Result<()>;

    /// Store a node. Replaces any node already at the key.
    fn store_node(
        &self,
        key: &Self::StoreKey,
        node: Node<Self::UserKey, Self::StoreKey>,
    ) -> Result<()>;

    /// Remove a node. Returns `Ok` without error if the key is absent.
    fn remove_node(&self, key: &Self::StoreKey) -> Result<()>;

    /// Remove a value. Returns `Ok` without error if the key is absent.
    fn remove_value(&self, key: &Self::StoreKey) -> Result<()>;

    /// Generate a fresh store key. Every call must return a key that has
    /// never been returned before.
    ///
    /// When a key is generated for a structural node the node is passed for
    /// context; when generated for an anonymous value (a paged list append,
    /// where the list API supplies no key) the value is passed instead.
    fn generate_key(
        &self,
        node: Option<&Node<Self::UserKey, Self::StoreKey>>,
        value: Option<&Self::Value>,
    ) -> Result<Self::StoreKey>;

    /// Convert a user key to a store key. Must be pure and deterministic:
    /// the same user key always yields the same store key.
    fn convert(&self, key: &Self::UserKey) -> Result<Self::StoreKey>;
}

// Structures hold their store by value; this lets callers hand them a
// borrow instead, including a borrowed transaction.
impl<S: NodeStore> NodeStore for &S {
    type UserKey = S::UserKey;
    type StoreKey = S::StoreKey;
    type Value = S::Value;

    fn load_value(&self, key: &Self::StoreKey) -> Result<Option<Self::Value>> {
        (**self).load_value(key)
    }

    fn load_node(&self, key: &Self::StoreKey) -> Result<Node<Self::UserKey, Self::StoreKey>> {
        (**self).load_node(key)
    }

    fn store_value(&self, key: &Self::StoreKey, value: Self::Value) -> Result<()> {
        (**self).store_value(key, value)
    }

    fn store_node(
        &self,
        key: &Self::StoreKey,
        node: Node<Self::UserKey, Self::StoreKey>,
    ) -> Result<()> {
        (**self).store_node(key, node)
    }

    fn remove_node(&self, key: &Self::StoreKey) -> Result<()> {
        (**self).remove_node(key)
    }

    fn remove_value(&self, key: &Self::StoreKey) -> Result<()> {
        (**self).remove_value(key)
    }

    fn generate_key(
        &self,
        node: Option<&Node<Self::UserKey, Self::StoreKey>>,
        value: Option<&Self::Value>,
    ) -> Result<Self::StoreKey> {
        (**self).generate_key(node, value)
    }

    fn convert(&self, key: &Self::UserKey) -> Result<Self::StoreKey> {
        (**self).convert(key)
    }
}
