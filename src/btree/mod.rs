//! B-tree Module
//!
//! A B-tree that keeps every node in a [`NodeStore`] instead of local
//! memory. Keys live by value inside nodes; each key's user value is stored
//! independently under the key's own converted store key, so point lookups
//! and overwrites never traverse the tree.
//!
//! ## Responsibilities
//! - Maintain sorted key order across nodes of bounded fan-out
//! - Split full nodes on the way down during inserts
//! - Pre-emptively rebalance (rotate or merge) on the way down during
//!   removals so the deletion site always has slack
//! - Provide cursors, ordered iteration, and bounded range selection
//!
//! There is no concurrency control here: edits to one tree must be
//! externally serialized, or buffered through a
//! [`crate::tx::Transaction`] whose backing store resolves conflicts.

mod location;
mod selection;

pub use location::BTreeLocation;
pub use selection::{Selection, SelectionIter};

use std::cell::Cell;

use tracing::trace;

use crate::config::BTreeConfig;
use crate::error::{CanopyError, Result};
use crate::node::Node;
use crate::store::NodeStore;

/// A B-tree persisted through a [`NodeStore`].
///
/// The tree is addressed by a single root store key whose identity never
/// changes for the tree's lifetime, even as the root's contents are
/// rewritten by splits and collapses. The root node itself is created
/// lazily on first access.
///
/// Every non-root node holds between `min_data` and `2 * min_data + 1`
/// keys; an internal node with `d` keys has `d + 1` children. A loaded
/// root is self-describing: its persisted capacity wins over the
/// configured `min_data` when an existing tree is reopened.
pub struct BTree<S: NodeStore> {
    root_key: S::StoreKey,
    store: S,
    min_data: Cell<usize>,
}

/// The current node and its parent during a mutating descent.
///
/// Nodes here are owned snapshots; every structural change is made durable
/// with an explicit store call before the walk moves on.
struct DescentContext<S: NodeStore> {
    parent: Option<(S::StoreKey, Node<S::UserKey, S::StoreKey>)>,
    node_key: S::StoreKey,
    node: Node<S::UserKey, S::StoreKey>,
}

impl<S: NodeStore> DescentContext<S> {
    fn at_root(&self) -> bool {
        self.parent.is_none()
    }
}

impl<S: NodeStore> BTree<S> {
    /// Open the tree rooted at the store key converted from `root`, with
    /// the default configuration.
    pub fn new(root: &S::UserKey, store: S) -> Result<Self> {
        Self::with_config(root, store, BTreeConfig::default())
    }

    /// Open the tree rooted at the store key converted from `root`.
    ///
    /// The root key is fixed for the lifetime of the tree. If a root node
    /// already exists its persisted capacities override `config.min_data`.
    pub fn with_config(root: &S::UserKey, store: S, config: BTreeConfig) -> Result<Self> {
        let root_key = store.convert(root)?;
        Ok(Self {
            root_key,
            store,
            min_data: Cell::new(config.min_data.max(1)),
        })
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Retrieve the value stored under `key`, without traversing the tree.
    pub fn get(&self, key: &S::UserKey) -> Result<Option<S::Value>> {
        self.store.load_value(&self.store.convert(key)?)
    }

    /// True if a value is stored under `key`.
    pub fn contains_key(&self, key: &S::UserKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite.
    ///
    /// A key that already has a value is overwritten in place with no
    /// structural change, returning the old value. A new key descends from
    /// the root, splitting every full node on the way down before choosing
    /// the child to enter, and returns `None`.
    pub fn put(&self, key: S::UserKey, value: S::Value) -> Result<Option<S::Value>> {
        let store_key = self.store.convert(&key)?;

        if let Some(old) = self.store.load_value(&store_key)? {
            self.store.store_value(&store_key, value)?;
            return Ok(Some(old));
        }

        let mut ctx = self.root_context()?;
        let mut insertion_point = 0;

        while !ctx.node.is_leaf() {
            self.conditionally_split(&mut ctx, insertion_point, &key)?;
            insertion_point = match ctx.node.data().binary_search(&key) {
                Ok(i) => i,
                Err(i) => i,
            };
            self.descend(&mut ctx, insertion_point)?;
        }

        self.conditionally_split(&mut ctx, insertion_point, &key)?;

        let at = match ctx.node.data().binary_search(&key) {
            Ok(i) => i,
            Err(i) => i,
        };
        ctx.node.data_mut().insert(at, key);
        self.store.store_value(&store_key, value)?;
        self.store.store_node(&ctx.node_key, ctx.node.clone())?;

        // A structural insert only happens for keys with no prior value.
        Ok(None)
    }

    /// Bulk [`BTree::put`].
    pub fn extend<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (S::UserKey, S::Value)>,
    {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Remove `key` and its value, rebalancing on the way down.
    ///
    /// Returns the removed value, or `None` if the key had none (no-op).
    /// Whenever the walk is about to enter a node holding only `min_data`
    /// keys, that node is first topped up by rotating a key from a sibling
    /// with surplus or merged with a sibling; the root is exempt. A key
    /// found in an internal node is replaced by its predecessor or
    /// successor pulled up through the same rebalancing walk.
    pub fn remove(&self, key: &S::UserKey) -> Result<Option<S::Value>> {
        let store_key = self.store.convert(key)?;
        let value = match self.store.load_value(&store_key)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let mut ctx = self.root_context()?;

        loop {
            match ctx.node.data().binary_search(key) {
                Err(insertion_point) => {
                    self.descend(&mut ctx, insertion_point)?;
                    self.conditionally_collapse(&mut ctx, insertion_point)?;
                }
                Ok(index) => {
                    if ctx.node.is_leaf() {
                        ctx.node.data_mut().remove(index);
                        self.store.store_node(&ctx.node_key, ctx.node.clone())?;
                        self.store.remove_value(&store_key)?;
                        break;
                    }
                    if self.internal_node_delete(&mut ctx, &store_key, index)? {
                        break;
                    }
                    // The key moved down into a merged child; keep
                    // searching from the current node.
                }
            }
        }

        Ok(Some(value))
    }

    // =========================================================================
    // Whole-tree Operations
    // =========================================================================

    /// Number of keys in the tree, counted by a full depth-first walk.
    /// Avoid on large trees.
    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        self.each_depth_first(|node| {
            count += node.data().len();
            Ok(true)
        })?;
        Ok(count)
    }

    /// True if the root holds no keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root()?.is_empty())
    }

    /// Linear scan for a value. Avoid on large trees.
    pub fn contains_value(&self, value: &S::Value) -> Result<bool>
    where
        S::Value: PartialEq,
    {
        for entry in self.iter()? {
            let (_, candidate) = entry?;
            if candidate == *value {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Remove every value and every non-root node, depth-first, children
    /// before self, then reset the root to an empty node. The root key
    /// keeps its identity so other handles to this tree stay valid.
    pub fn clear(&self) -> Result<()> {
        self.each_depth_first(|node| {
            for key in node.data() {
                self.store.remove_value(&self.store.convert(key)?)?;
            }
            for child_key in node.children() {
                self.store.remove_node(child_key)?;
            }
            Ok(true)
        })?;

        self.store.store_node(&self.root_key, self.new_node())
    }

    /// [`BTree::clear`], then remove the root key itself. Nothing this
    /// tree ever stored remains resolvable afterwards.
    pub fn destroy(&self) -> Result<()> {
        self.clear()?;
        self.store.remove_node(&self.root_key)
    }

    /// Visit every node depth-first, children before self, stopping early
    /// when `f` returns `Ok(false)`. The same order [`BTree::clear`] uses;
    /// intended for external maintenance tasks.
    pub fn each_depth_first<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Node<S::UserKey, S::StoreKey>) -> Result<bool>,
    {
        let root = self.root()?;
        self.each_depth_first_from(&root, &mut f)?;
        Ok(())
    }

    fn each_depth_first_from<F>(&self, node: &Node<S::UserKey, S::StoreKey>, f: &mut F) -> Result<bool>
    where
        F: FnMut(&Node<S::UserKey, S::StoreKey>) -> Result<bool>,
    {
        for child_key in node.children() {
            let child = self.store.load_node(child_key)?;
            if !self.each_depth_first_from(&child, f)? {
                return Ok(false);
            }
        }
        f(node)
    }

    // =========================================================================
    // Cursors, Iteration, Selection
    // =========================================================================

    /// Position a cursor at `key`, or at `key`'s insertion point if it is
    /// not present.
    pub fn location_of(&self, key: &S::UserKey) -> Result<BTreeLocation<'_, S>> {
        let root = self.root()?;
        let mut location = BTreeLocation::new(&self.store, root, 0);

        let mut found = location.node().data().binary_search(key);
        while let Err(insertion_point) = found {
            if location.node().is_leaf() {
                break;
            }
            location.go(insertion_point as isize);
            location = location.descend(insertion_point)?;
            found = location.node().data().binary_search(key);
        }

        let target = match found {
            Ok(index) => index,
            Err(insertion_point) => insertion_point,
        };
        location.go(target as isize);
        Ok(location)
    }

    /// Lazy ascending key iterator. One-shot: restart by calling again.
    pub fn keys(&self) -> Result<Keys<'_, S>> {
        Ok(Keys {
            state: Some(self.start()?),
        })
    }

    /// Lazy descending key iterator. One-shot: restart by calling again.
    pub fn keys_rev(&self) -> Result<KeysRev<'_, S>> {
        Ok(KeysRev {
            state: Some(self.end()?),
        })
    }

    /// Lazy ascending `(key, value)` iterator.
    pub fn iter(&self) -> Result<Entries<'_, S>> {
        Ok(Entries {
            keys: self.keys()?,
            store: &self.store,
        })
    }

    /// Lazy ascending value iterator.
    pub fn values(&self) -> Result<Values<'_, S>> {
        Ok(Values { entries: self.iter()? })
    }

    /// Select the half-open range `[lower, upper)` as a lazy sequence.
    pub fn select(&self, lower: &S::UserKey, upper: &S::UserKey) -> Result<Selection<'_, S>> {
        Ok(Selection::new(
            self.location_of(lower)?,
            self.location_of(upper)?,
        ))
    }

    /// A cursor on the before-first sentinel position.
    fn start(&self) -> Result<BTreeLocation<'_, S>> {
        let root = self.root()?;
        let mut location = BTreeLocation::new(&self.store, root, 0).min()?;
        location.go(-1);
        Ok(location)
    }

    /// A cursor on the after-last sentinel position.
    fn end(&self) -> Result<BTreeLocation<'_, S>> {
        let root = self.root()?;
        let mut location = BTreeLocation::new(&self.store, root, 0).max()?;
        let after_last = location.node().data().len() as isize;
        location.go(after_last);
        Ok(location)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The store this tree reads and writes through.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The fixed store key of the root node.
    pub fn root_key(&self) -> &S::StoreKey {
        &self.root_key
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Load the root, or create it empty if absent. A loaded root refreshes
    /// `min_data` from its persisted capacity.
    fn root(&self) -> Result<Node<S::UserKey, S::StoreKey>> {
        match self.store.load_node(&self.root_key) {
            Ok(root) => {
                self.min_data.set((root.data_cap() / 2).max(1));
                Ok(root)
            }
            Err(CanopyError::NodeNotFound(_)) => {
                let root = self.new_node();
                self.store.store_node(&self.root_key, root.clone())?;
                Ok(root)
            }
            Err(e) => Err(e),
        }
    }

    fn root_context(&self) -> Result<DescentContext<S>> {
        let root = self.root()?;
        Ok(DescentContext {
            parent: None,
            node_key: self.root_key.clone(),
            node: root,
        })
    }

    /// A node shaped for this tree: `2m + 2` children, `2m + 1` data, no
    /// ancestors.
    fn new_node(&self) -> Node<S::UserKey, S::StoreKey> {
        let m = self.min_data.get();
        Node::new(2 * m + 2, 2 * m + 1, 0)
    }

    /// Step the context into child `child`, keeping the old position as
    /// the parent.
    fn descend(&self, ctx: &mut DescentContext<S>, child: usize) -> Result<()> {
        let child_key = ctx.node.children().get(child).cloned().ok_or_else(|| {
            CanopyError::Storage(
                "descent into missing child: tree and value store disagree".to_string(),
            )
        })?;
        let child_node = self.store.load_node(&child_key)?;

        let old_key = std::mem::replace(&mut ctx.node_key, child_key);
        let old_node = std::mem::replace(&mut ctx.node, child_node);
        ctx.parent = Some((old_key, old_node));
        Ok(())
    }

    /// Split the context's node if it is full, rewriting the parent (or the
    /// root in place) and leaving the context inside whichever half will
    /// hold `user_key`.
    fn conditionally_split(
        &self,
        ctx: &mut DescentContext<S>,
        parent_insertion_point: usize,
        user_key: &S::UserKey,
    ) -> Result<bool> {
        if !ctx.node.is_data_full() {
            return Ok(false);
        }

        let m = self.min_data.get();
        trace!("splitting full node");

        let mut left = self.new_node();
        let mut right = self.new_node();

        left.data_mut()
            .extend(ctx.node.data()[..m].iter().cloned());
        right
            .data_mut()
            .extend(ctx.node.data()[m + 1..2 * m + 1].iter().cloned());
        let middle_key = ctx.node.data()[m].clone();

        if !ctx.node.is_leaf() {
            left.children_mut()
                .extend(ctx.node.children()[..m + 1].iter().cloned());
            right
                .children_mut()
                .extend(ctx.node.children()[m + 1..2 * m + 2].iter().cloned());
        }

        let left_key = self.store.generate_key(Some(&left), None)?;
        let right_key = self.store.generate_key(Some(&right), None)?;

        if ctx.at_root() {
            // Root split: the root key keeps its identity, its content
            // becomes the single promoted key over the two halves. The
            // walk continues below, so the promoted root is the parent.
            let mut new_root = self.new_node();
            new_root.data_mut().push(middle_key.clone());
            new_root.children_mut().push(left_key.clone());
            new_root.children_mut().push(right_key.clone());
            self.store.store_node(&ctx.node_key, new_root.clone())?;
            ctx.parent = Some((ctx.node_key.clone(), new_root));
        } else if let Some((parent_key, parent)) = &mut ctx.parent {
            parent
                .data_mut()
                .insert(parent_insertion_point, middle_key.clone());
            parent.children_mut()[parent_insertion_point] = right_key.clone();
            parent
                .children_mut()
                .insert(parent_insertion_point, left_key.clone());
            self.store.remove_node(&ctx.node_key)?;
            self.store.store_node(parent_key, parent.clone())?;
        }

        self.store.store_node(&right_key, right.clone())?;
        self.store.store_node(&left_key, left.clone())?;

        if middle_key <= *user_key {
            ctx.node = right;
            ctx.node_key = right_key;
        } else {
            ctx.node = left;
            ctx.node_key = left_key;
        }

        Ok(true)
    }

    /// If the context's node sits at exactly `min_data` keys, top it up:
    /// merge with a sibling also at `min_data` (left preferred), or rotate
    /// a key from a sibling with surplus. The root is exempt. When a merge
    /// empties the parent — only possible at the root — the merged child
    /// becomes the new root content and the root key survives.
    fn conditionally_collapse(
        &self,
        ctx: &mut DescentContext<S>,
        parent_insertion_point: usize,
    ) -> Result<bool> {
        let m = self.min_data.get();
        if ctx.node.data().len() != m {
            return Ok(false);
        }
        let (parent_key, mut parent) = match ctx.parent.take() {
            Some(p) => p,
            None => return Ok(false),
        };

        let mut left_sibling = None;
        if parent_insertion_point > 0 {
            let key = parent.children()[parent_insertion_point - 1].clone();
            let node = self.store.load_node(&key)?;
            left_sibling = Some((key, node));
        }

        let mut right_sibling = None;
        if parent_insertion_point + 1 < parent.children().len() {
            let key = parent.children()[parent_insertion_point + 1].clone();
            let node = self.store.load_node(&key)?;
            right_sibling = Some((key, node));
        }

        let left_len = left_sibling.as_ref().map(|(_, n)| n.data().len());
        let right_len = right_sibling.as_ref().map(|(_, n)| n.data().len());

        // A sibling at min_data means merge; merging left is preferred and
        // the branch order decides which separator survives promotion.
        if left_len == Some(m) {
            if let Some((left_key, mut left)) = left_sibling {
                trace!("merging node into its left sibling");
                if !ctx.node.is_leaf() {
                    left.children_mut().extend_from_slice(ctx.node.children());
                }
                left.data_mut()
                    .push(parent.data_mut().remove(parent_insertion_point - 1));
                left.data_mut().extend_from_slice(ctx.node.data());

                parent.children_mut().remove(parent_insertion_point);
                self.store.remove_node(&ctx.node_key)?;

                if parent.data().is_empty() {
                    // The parent can only be the root; its key identity
                    // survives with the merged content.
                    self.store.remove_node(&left_key)?;
                    ctx.node_key = parent_key;
                    ctx.node = left;
                } else {
                    self.store.store_node(&parent_key, parent.clone())?;
                    ctx.node_key = left_key;
                    ctx.node = left;
                    ctx.parent = Some((parent_key, parent));
                }

                self.store.store_node(&ctx.node_key, ctx.node.clone())?;
            }
            return Ok(true);
        }

        if right_len == Some(m) {
            if let Some((right_key, right)) = right_sibling {
                trace!("merging right sibling into node");
                if !right.is_leaf() {
                    ctx.node.children_mut().extend_from_slice(right.children());
                }
                ctx.node
                    .data_mut()
                    .push(parent.data_mut().remove(parent_insertion_point));
                ctx.node.data_mut().extend_from_slice(right.data());

                parent.children_mut().remove(parent_insertion_point + 1);
                self.store.remove_node(&right_key)?;

                if parent.data().is_empty() {
                    self.store.remove_node(&ctx.node_key)?;
                    ctx.node_key = parent_key;
                } else {
                    self.store.store_node(&parent_key, parent.clone())?;
                    ctx.parent = Some((parent_key, parent));
                }

                self.store.store_node(&ctx.node_key, ctx.node.clone())?;
            }
            return Ok(true);
        }

        if left_len.map_or(false, |len| len > m) {
            if let Some((left_key, mut left)) = left_sibling {
                trace!("rotating a key from the left sibling");
                if !left.is_leaf() {
                    if let Some(shifted) = left.children_mut().pop() {
                        ctx.node.children_mut().insert(0, shifted);
                    }
                }
                if let Some(left_data) = left.data_mut().pop() {
                    let parent_data = std::mem::replace(
                        &mut parent.data_mut()[parent_insertion_point - 1],
                        left_data,
                    );
                    ctx.node.data_mut().insert(0, parent_data);
                }

                self.store.store_node(&ctx.node_key, ctx.node.clone())?;
                self.store.store_node(&left_key, left)?;
                self.store.store_node(&parent_key, parent.clone())?;
                ctx.parent = Some((parent_key, parent));
            }
            return Ok(true);
        }

        if right_len.map_or(false, |len| len > m) {
            if let Some((right_key, mut right)) = right_sibling {
                trace!("rotating a key from the right sibling");
                if !right.is_leaf() {
                    let shifted = right.children_mut().remove(0);
                    ctx.node.children_mut().push(shifted);
                }
                let right_data = right.data_mut().remove(0);
                let parent_data = std::mem::replace(
                    &mut parent.data_mut()[parent_insertion_point],
                    right_data,
                );
                ctx.node.data_mut().push(parent_data);

                self.store.store_node(&ctx.node_key, ctx.node.clone())?;
                self.store.store_node(&right_key, right)?;
                self.store.store_node(&parent_key, parent.clone())?;
                ctx.parent = Some((parent_key, parent));
            }
            return Ok(true);
        }

        // No sibling can help (single-child parent); leave the node as is.
        ctx.parent = Some((parent_key, parent));
        Ok(true)
    }

    /// Delete a key found in an internal node by replacing it with the
    /// predecessor (left subtree max) or successor (right subtree min)
    /// when a child has slack. When both children sit at `min_data` the
    /// two are merged under the pushed-down separator and `false` is
    /// returned: the key now lives in the merged child and the caller
    /// must keep searching.
    fn internal_node_delete(
        &self,
        ctx: &mut DescentContext<S>,
        store_key: &S::StoreKey,
        index: usize,
    ) -> Result<bool> {
        let m = self.min_data.get();
        let left_child_key = ctx.node.children()[index].clone();
        let right_child_key = ctx.node.children()[index + 1].clone();
        let left_child = self.store.load_node(&left_child_key)?;
        let right_child = self.store.load_node(&right_child_key)?;

        if left_child.data().len() == m {
            if right_child.data().len() == m {
                trace!("merging children under the key being removed");
                let mut merged = left_child;
                merged.data_mut().push(ctx.node.data_mut().remove(index));
                merged.data_mut().extend_from_slice(right_child.data());

                ctx.node.children_mut().remove(index + 1);

                if !merged.is_leaf() {
                    merged
                        .children_mut()
                        .extend_from_slice(right_child.children());
                }

                self.store.store_node(&ctx.node_key, ctx.node.clone())?;
                self.store.store_node(&left_child_key, merged)?;
                self.store.remove_node(&right_child_key)?;

                return Ok(false);
            }

            // The right child has slack: pull up the successor.
            let mut subtree = DescentContext {
                parent: Some((ctx.node_key.clone(), ctx.node.clone())),
                node_key: right_child_key,
                node: right_child,
            };
            let replacement = self.detach_min(&mut subtree)?;
            ctx.node.data_mut()[index] = replacement;
            self.store.store_node(&ctx.node_key, ctx.node.clone())?;
            self.store.remove_value(store_key)?;
        } else {
            // The left child has slack: pull up the predecessor.
            let mut subtree = DescentContext {
                parent: Some((ctx.node_key.clone(), ctx.node.clone())),
                node_key: left_child_key,
                node: left_child,
            };
            let replacement = self.detach_max(&mut subtree)?;
            ctx.node.data_mut()[index] = replacement;
            self.store.store_node(&ctx.node_key, ctx.node.clone())?;
            self.store.remove_value(store_key)?;
        }

        Ok(true)
    }

    /// Remove and return the maximum key of the subtree under `ctx`,
    /// rebalancing on the way down. The key's value is left untouched.
    fn detach_max(&self, ctx: &mut DescentContext<S>) -> Result<S::UserKey> {
        while !ctx.node.is_leaf() {
            let index = ctx.node.children().len() - 1;
            self.descend(ctx, index)?;
            self.conditionally_collapse(ctx, index)?;
        }

        let key = ctx.node.data_mut().pop().ok_or_else(|| {
            CanopyError::Storage("detaching the maximum of an empty subtree".to_string())
        })?;
        self.store.store_node(&ctx.node_key, ctx.node.clone())?;
        Ok(key)
    }

    /// Remove and return the minimum key of the subtree under `ctx`,
    /// rebalancing on the way down. The key's value is left untouched.
    fn detach_min(&self, ctx: &mut DescentContext<S>) -> Result<S::UserKey> {
        while !ctx.node.is_leaf() {
            self.descend(ctx, 0)?;
            self.conditionally_collapse(ctx, 0)?;
        }

        if ctx.node.data().is_empty() {
            return Err(CanopyError::Storage(
                "detaching the minimum of an empty subtree".to_string(),
            ));
        }
        let key = ctx.node.data_mut().remove(0);
        self.store.store_node(&ctx.node_key, ctx.node.clone())?;
        Ok(key)
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Ascending key iterator over a [`BTree`].
pub struct Keys<'a, S: NodeStore> {
    state: Option<BTreeLocation<'a, S>>,
}

impl<'a, S: NodeStore> Iterator for Keys<'a, S> {
    type Item = Result<S::UserKey>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = self.state.take()?;
        if !state.has_next() {
            return None;
        }
        match state.next() {
            Ok(Some(advanced)) => {
                let key = advanced.key().cloned();
                self.state = Some(advanced);
                key.map(Ok)
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Descending key iterator over a [`BTree`].
pub struct KeysRev<'a, S: NodeStore> {
    state: Option<BTreeLocation<'a, S>>,
}

impl<'a, S: NodeStore> Iterator for KeysRev<'a, S> {
    type Item = Result<S::UserKey>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = self.state.take()?;
        if !state.has_prev() {
            return None;
        }
        match state.prev() {
            Ok(Some(advanced)) => {
                let key = advanced.key().cloned();
                self.state = Some(advanced);
                key.map(Ok)
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Ascending `(key, value)` iterator over a [`BTree`].
pub struct Entries<'a, S: NodeStore> {
    keys: Keys<'a, S>,
    store: &'a S,
}

impl<'a, S: NodeStore> Entries<'a, S> {
    fn load_entry(&self, key: S::UserKey) -> Result<(S::UserKey, S::Value)> {
        let store_key = self.store.convert(&key)?;
        let value = self.store.load_value(&store_key)?.ok_or_else(|| {
            CanopyError::Storage("value missing for a key present in the tree".to_string())
        })?;
        Ok((key, value))
    }
}

impl<'a, S: NodeStore> Iterator for Entries<'a, S> {
    type Item = Result<(S::UserKey, S::Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.keys.next()? {
            Ok(key) => Some(self.load_entry(key)),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Ascending value iterator over a [`BTree`].
pub struct Values<'a, S: NodeStore> {
    entries: Entries<'a, S>,
}

impl<'a, S: NodeStore> Iterator for Values<'a, S> {
    type Item = Result<S::Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.entries.next()? {
            Ok((_, value)) => Some(Ok(value)),
            Err(e) => Some(Err(e)),
        }
    }
}
