//! Node Module
//!
//! The single structural entity persisted through a [`crate::store::NodeStore`].
//!
//! ## Responsibilities
//! - Hold the ordered key list (`data`) and the child/ancestor pointer lists
//! - Carry its own capacities so a loaded node is self-describing
//! - Answer the structural predicates (leaf, root, fullness)
//!
//! A node never knows the key it is stored under; all linkage between nodes
//! is expressed as store keys resolved through the storage abstraction, never
//! as in-memory references. Nodes are value-semantic snapshots: mutate a
//! local copy, then make the change durable with an explicit
//! `store_node(key, node)` call.

mod codec;

pub use codec::{read_node, write_node};

use serde::{Deserialize, Serialize};

/// A persisted structural node.
///
/// `K` is the user key type held in `data`; `SK` is the store key type held
/// in `children` and `ancestors`. A B-tree stores user keys in `data`; a
/// paged list stores value-reference store keys there (so `K == SK` in that
/// use).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<K, SK> {
    /// Keys that point to user data, in ascending order for B-tree nodes.
    data: Vec<K>,

    /// Store keys of child nodes. A paged list page uses `children[0]` as
    /// its "next" pointer.
    children: Vec<SK>,

    /// Store keys of ancestor nodes. A paged list page uses `ancestors[0]`
    /// as its "prev" pointer; B-tree nodes leave this empty.
    ancestors: Vec<SK>,

    data_cap: usize,
    child_cap: usize,
    ancestor_cap: usize,
}

impl<K, SK> Node<K, SK> {
    /// Create an empty node with the given capacities.
    pub fn new(child_cap: usize, data_cap: usize, ancestor_cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(data_cap),
            children: Vec::with_capacity(child_cap),
            ancestors: Vec::with_capacity(ancestor_cap),
            data_cap,
            child_cap,
            ancestor_cap,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn data(&self) -> &[K] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Vec<K> {
        &mut self.data
    }

    pub fn children(&self) -> &[SK] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<SK> {
        &mut self.children
    }

    pub fn ancestors(&self) -> &[SK] {
        &self.ancestors
    }

    pub fn ancestors_mut(&mut self) -> &mut Vec<SK> {
        &mut self.ancestors
    }

    pub fn data_cap(&self) -> usize {
        self.data_cap
    }

    pub fn child_cap(&self) -> usize {
        self.child_cap
    }

    pub fn ancestor_cap(&self) -> usize {
        self.ancestor_cap
    }

    // =========================================================================
    // Structural Predicates
    // =========================================================================

    /// True if this node holds no data keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A node is a leaf iff it has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// A B-tree node is the root iff it has no ancestors.
    pub fn is_root(&self) -> bool {
        self.ancestors.is_empty()
    }

    pub fn is_data_full(&self) -> bool {
        self.data.len() == self.data_cap
    }

    pub fn is_children_full(&self) -> bool {
        self.children.len() == self.child_cap
    }

    pub fn is_ancestors_full(&self) -> bool {
        self.ancestors.len() == self.ancestor_cap
    }
}
