//! B-tree cursor
//!
//! A [`BTreeLocation`] is a resumable position in an in-order walk: the
//! current node, an index into its data, and the chain of ancestor cursor
//! states it descended through. The chain holds *states*, not node loads —
//! walking back up never re-fetches an ancestor.
//!
//! The index ranges over `-1 ..= data.len()`: the two out-of-range values
//! are the before-first and after-last sentinels used by iterators and
//! range bounds.

use std::cmp::Ordering;

use crate::error::Result;
use crate::node::Node;
use crate::store::NodeStore;

/// A position in an in-order traversal of a B-tree.
pub struct BTreeLocation<'a, S: NodeStore> {
    store: &'a S,

    /// The state we left the parent node in (not the parent node itself).
    parent: Option<Box<BTreeLocation<'a, S>>>,

    node: Node<S::UserKey, S::StoreKey>,
    index: isize,

    /// Whether this node alone still has a successor, ignoring ancestors.
    /// Recomputed on every index change.
    subtree_has_next: bool,

    /// Whether this node alone still has a predecessor, ignoring ancestors.
    /// Recomputed on every index change.
    subtree_has_prev: bool,
}

impl<'a, S: NodeStore> Clone for BTreeLocation<'a, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            parent: self.parent.clone(),
            node: self.node.clone(),
            index: self.index,
            subtree_has_next: self.subtree_has_next,
            subtree_has_prev: self.subtree_has_prev,
        }
    }
}

impl<'a, S: NodeStore> BTreeLocation<'a, S> {
    pub(crate) fn new(store: &'a S, node: Node<S::UserKey, S::StoreKey>, index: isize) -> Self {
        let mut location = Self {
            store,
            parent: None,
            node,
            index,
            subtree_has_next: false,
            subtree_has_prev: false,
        };
        location.recompute_flags();
        location
    }

    /// The key under the cursor, if the index is on a data slot.
    pub fn key(&self) -> Option<&S::UserKey> {
        if self.index < 0 {
            return None;
        }
        self.node.data().get(self.index as usize)
    }

    /// The node under the cursor.
    pub fn node(&self) -> &Node<S::UserKey, S::StoreKey> {
        &self.node
    }

    /// True if an in-order successor exists here or in any ancestor state.
    pub fn has_next(&self) -> bool {
        if self.subtree_has_next {
            return true;
        }
        self.parent.as_ref().map_or(false, |p| p.has_next())
    }

    /// True if an in-order predecessor exists here or in any ancestor state.
    pub fn has_prev(&self) -> bool {
        if self.subtree_has_prev {
            return true;
        }
        self.parent.as_ref().map_or(false, |p| p.has_prev())
    }

    /// Order two cursors by the key under each, clamping an out-of-range
    /// index to the node's first/last key so sentinel positions still
    /// bound ranges. A cursor on an empty node orders after one with data.
    pub fn compare(&self, other: &Self) -> Ordering {
        let this_len = self.node.data().len();
        let that_len = other.node.data().len();

        if this_len == 0 && that_len > 0 {
            return Ordering::Greater;
        }
        if this_len > 0 && that_len == 0 {
            return Ordering::Less;
        }
        if this_len == 0 && that_len == 0 {
            return Ordering::Equal;
        }

        self.clamped_key().cmp(other.clamped_key())
    }

    /// Step to the in-order successor. Must only be called when
    /// [`BTreeLocation::has_next`] is true; returns `None` once the walk is
    /// exhausted.
    pub fn next(mut self) -> Result<Option<Self>> {
        if self.subtree_has_next {
            let target = self.index + 1;
            self.go(target);

            if self.node.is_leaf() {
                return Ok(Some(self));
            }

            // Leaving an internal node: the successor is the minimum of
            // the subtree between this key and the next.
            let child = self.index as usize;
            let mut location = self.descend(child)?;
            location.go(0);
            while !location.node.is_leaf() {
                location.go(0);
                location = location.descend(0)?;
                location.go(0);
            }
            Ok(Some(location))
        } else {
            Ok(self.walk_up_until_has_next())
        }
    }

    /// Step to the in-order predecessor. Must only be called when
    /// [`BTreeLocation::has_prev`] is true; returns `None` once the walk is
    /// exhausted.
    pub fn prev(mut self) -> Result<Option<Self>> {
        if self.subtree_has_prev {
            let target = self.index - 1;
            self.go(target);

            if self.node.is_leaf() {
                return Ok(Some(self));
            }

            // The predecessor is the maximum of the subtree to the left
            // of the key we just stepped off.
            let child = (self.index + 1) as usize;
            let mut location = self.descend(child)?;
            let last = location.node.data().len() as isize - 1;
            location.go(last);
            while !location.node.is_leaf() {
                let right_child = location.node.children().len() - 1;
                location.go(right_child as isize);
                location = location.descend(right_child)?;
                let last = location.node.data().len() as isize - 1;
                location.go(last);
            }
            Ok(Some(location))
        } else {
            Ok(self.walk_up_until_has_prev())
        }
    }

    // =========================================================================
    // Crate-internal Positioning
    // =========================================================================

    /// Set the index and recompute the local direction flags.
    pub(crate) fn go(&mut self, index: isize) {
        self.index = index;
        self.recompute_flags();
    }

    /// Push the current state and step into the given child.
    pub(crate) fn descend(self, child: usize) -> Result<Self> {
        let store = self.store;
        let node = store.load_node(&self.node.children()[child])?;
        let mut location = Self {
            store,
            parent: Some(Box::new(self)),
            node,
            index: 0,
            subtree_has_next: false,
            subtree_has_prev: false,
        };
        location.recompute_flags();
        Ok(location)
    }

    /// Reposition at the minimum of the current subtree.
    pub(crate) fn min(mut self) -> Result<Self> {
        self.go(0);
        while !self.node.is_leaf() {
            self.go(0);
            self = self.descend(0)?;
            self.go(0);
        }
        Ok(self)
    }

    /// Reposition at the maximum of the current subtree.
    pub(crate) fn max(mut self) -> Result<Self> {
        let right_child = self.node.children().len() as isize - 1;
        self.go(right_child);
        while !self.node.is_leaf() {
            let right_child = self.node.children().len() - 1;
            self.go(right_child as isize);
            self = self.descend(right_child)?;
            let last = self.node.data().len() as isize - 1;
            self.go(last);
        }
        Ok(self)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn recompute_flags(&mut self) {
        let following = self.index + 1;
        self.subtree_has_next = (following >= 0 && (following as usize) < self.node.data().len())
            || (following >= 0 && (following as usize) < self.node.children().len());
        self.subtree_has_prev =
            self.index > 0 || (!self.node.is_leaf() && self.index > -1);
    }

    fn clamped_key(&self) -> &S::UserKey {
        let last = self.node.data().len() as isize - 1;
        let index = self.index.clamp(0, last) as usize;
        &self.node.data()[index]
    }

    /// Pop ancestor states until one still has a local successor. Handles
    /// the direction-switch case where an ancestor's index sits on the
    /// before-first sentinel.
    fn walk_up_until_has_next(self) -> Option<Self> {
        let mut current = self.parent;
        while let Some(mut state) = current {
            if state.subtree_has_next {
                state.subtree_has_prev = true;
                if state.index == -1 {
                    let target = state.index + 1;
                    state.go(target);
                }
                return Some(*state);
            }
            current = state.parent.take();
        }
        None
    }

    /// Pop ancestor states until one still has a local predecessor.
    /// Handles the direction-switch case where an ancestor's index ran off
    /// the end of its data.
    fn walk_up_until_has_prev(self) -> Option<Self> {
        let mut current = self.parent;
        while let Some(mut state) = current {
            if state.subtree_has_prev {
                state.subtree_has_next = true;
                if state.index == state.node.data().len() as isize {
                    let target = state.index - 1;
                    state.go(target);
                }
                return Some(*state);
            }
            current = state.parent.take();
        }
        None
    }
}
