//! Paged-list cursor
//!
//! A [`PagedListLocation`] wraps one page plus an offset into it. Unlike
//! the B-tree cursor it carries no ancestor chain: pages link to their
//! neighbors directly through their next/prev pointers.

use crate::error::{CanopyError, Result};
use crate::node::Node;
use crate::store::NodeStore;

/// A position inside one page of a paged list.
pub struct PagedListLocation<'a, S: NodeStore> {
    node_store: &'a S,
    key: S::StoreKey,
    node: Node<S::UserKey, S::StoreKey>,
    index: usize,
}

impl<'a, S: NodeStore> PagedListLocation<'a, S> {
    /// Load the page stored at `key` and position at its first slot.
    pub(crate) fn load(node_store: &'a S, key: S::StoreKey) -> Result<Self> {
        let node = node_store.load_node(&key)?;
        Ok(Self {
            node_store,
            key,
            node,
            index: 0,
        })
    }

    /// Wrap an already-loaded page.
    pub(crate) fn with_node(
        node_store: &'a S,
        key: S::StoreKey,
        node: Node<S::UserKey, S::StoreKey>,
    ) -> Self {
        Self {
            node_store,
            key,
            node,
            index: 0,
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Store key of the following page.
    pub fn next_key(&self) -> Result<S::StoreKey> {
        self.node.children().first().cloned().ok_or_else(|| {
            CanopyError::Storage("page is missing its next pointer".to_string())
        })
    }

    /// Store key of the preceding page.
    pub fn prev_key(&self) -> Result<S::StoreKey> {
        self.node.ancestors().first().cloned().ok_or_else(|| {
            CanopyError::Storage("page is missing its prev pointer".to_string())
        })
    }

    /// Load the following page.
    pub fn next(&self) -> Result<Self> {
        Self::load(self.node_store, self.next_key()?)
    }

    /// Load the preceding page.
    pub fn prev(&self) -> Result<Self> {
        Self::load(self.node_store, self.prev_key()?)
    }

    // =========================================================================
    // Position
    // =========================================================================

    /// Reposition and return self, for chaining.
    pub fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The value-reference key in the current slot, if the index is in
    /// range.
    pub fn data_key(&self) -> Option<&S::UserKey> {
        self.node.data().get(self.index)
    }

    /// Number of value references in this page.
    pub fn size(&self) -> usize {
        self.node.data().len()
    }

    // =========================================================================
    // Page Access
    // =========================================================================

    pub fn key(&self) -> &S::StoreKey {
        &self.key
    }

    pub fn node(&self) -> &Node<S::UserKey, S::StoreKey> {
        &self.node
    }

    pub(crate) fn node_mut(&mut self) -> &mut Node<S::UserKey, S::StoreKey> {
        &mut self.node
    }

    /// Write the current page content back under the current key.
    pub(crate) fn persist(&self) -> Result<()> {
        self.node_store.store_node(&self.key, self.node.clone())
    }

    /// Remove this page's key from the store.
    pub(crate) fn remove(&self) -> Result<()> {
        self.node_store.remove_node(&self.key)
    }
}
