//! Paged List Module
//!
//! A circular, doubly-linked sequence of fixed-capacity pages persisted
//! through a [`NodeStore`]. Each page records value-reference keys in its
//! data list; `children[0]` is the next page, `ancestors[0]` the previous.
//!
//! ## Responsibilities
//! - Keep the circular chain intact across page splits and merges
//! - Append in amortized O(1) by inserting empty pages after a full tail
//! - Merge underfilled neighbors after removals, never deleting the head
//! - Provide index-based access by linear page scan
//!
//! The list performs well for in-order aggregation but fragments quickly
//! under arbitrary-index inserts. There is no concurrency control here;
//! see the crate docs.
//!
//! This store is used with `UserKey == StoreKey`: a page's data slots hold
//! store keys of independently stored values.

mod location;

pub use location::PagedListLocation;

use std::cell::Cell;

use tracing::trace;

use crate::config::PagedListConfig;
use crate::error::{CanopyError, Result};
use crate::node::Node;
use crate::store::NodeStore;

/// A paged list persisted through a [`NodeStore`].
///
/// The list is addressed by a single head store key whose identity never
/// changes. The head page is created lazily, self-linked, on first access.
/// If the head page is the only page its next and prev both point at
/// itself; otherwise following next pointers repeatedly returns to the
/// head. A loaded head is self-describing: its persisted capacity wins
/// over the configured `page_size`.
pub struct PagedList<S>
where
    S: NodeStore<UserKey = <S as NodeStore>::StoreKey>,
{
    head_key: S::StoreKey,
    store: S,
    page_size: Cell<usize>,
}

impl<S> PagedList<S>
where
    S: NodeStore<UserKey = <S as NodeStore>::StoreKey>,
{
    /// Open the list stored under `head_key`, with the default
    /// configuration.
    pub fn new(head_key: S::StoreKey, store: S) -> Self {
        Self::with_config(head_key, store, PagedListConfig::default())
    }

    /// Open the list stored under `head_key`.
    ///
    /// The head key is fixed for the lifetime of the list. If a head page
    /// already exists its persisted capacity overrides `config.page_size`.
    pub fn with_config(head_key: S::StoreKey, store: S, config: PagedListConfig) -> Self {
        Self {
            head_key,
            store,
            page_size: Cell::new(config.page_size.max(1)),
        }
    }

    // =========================================================================
    // Appends and Inserts
    // =========================================================================

    /// Append a value at the end of the list.
    pub fn push(&self, value: S::Value) -> Result<()> {
        let ctx = self.find_last_insertion_point()?;
        self.add_at(ctx, value)
    }

    /// Insert a value so it occupies position `index`. `index` may equal
    /// the current length, which appends.
    pub fn insert(&self, index: usize, value: S::Value) -> Result<()> {
        let ctx = self.find_insertion_point(index)?;
        self.add_at(ctx, value)
    }

    /// Bulk append. Returns true if anything was added.
    pub fn extend<I>(&self, values: I) -> Result<bool>
    where
        I: IntoIterator<Item = S::Value>,
    {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return Ok(false);
        }
        let ctx = self.find_last_insertion_point()?;
        self.add_all_at(ctx, values)
    }

    /// Bulk insert at `index`. Returns true if anything was added.
    pub fn insert_all<I>(&self, index: usize, values: I) -> Result<bool>
    where
        I: IntoIterator<Item = S::Value>,
    {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return Ok(false);
        }
        let ctx = self.find_insertion_point(index)?;
        self.add_all_at(ctx, values)
    }

    // =========================================================================
    // Random Access (linear page scan)
    // =========================================================================

    /// The value at `index`.
    pub fn get(&self, index: usize) -> Result<S::Value> {
        let mut remaining = index;
        for page in self.pages()? {
            let page = page?;
            if remaining < page.data().len() {
                let value_key = &page.data()[remaining];
                return self.store.load_value(value_key)?.ok_or_else(missing_value);
            }
            remaining -= page.data().len();
        }
        Err(CanopyError::IndexOutOfBounds {
            index,
            size: self.len()?,
        })
    }

    /// Replace the value at `index`, returning the old value. The value's
    /// store key is unchanged.
    pub fn set(&self, index: usize, value: S::Value) -> Result<S::Value> {
        let ctx = self.seek(index)?;
        let value_key = match ctx.data_key() {
            Some(k) => k.clone(),
            None => {
                return Err(CanopyError::IndexOutOfBounds {
                    index,
                    size: self.len()?,
                })
            }
        };
        let old = self.store.load_value(&value_key)?.ok_or_else(missing_value)?;
        self.store.store_value(&value_key, value)?;
        Ok(old)
    }

    /// Index of the first occurrence of `value`, by linear scan.
    pub fn index_of(&self, value: &S::Value) -> Result<Option<usize>>
    where
        S::Value: PartialEq,
    {
        let mut index = 0;
        for page in self.pages()? {
            let page = page?;
            for (offset, value_key) in page.data().iter().enumerate() {
                if let Some(candidate) = self.store.load_value(value_key)? {
                    if candidate == *value {
                        return Ok(Some(index + offset));
                    }
                }
            }
            index += page.data().len();
        }
        Ok(None)
    }

    /// Index of the last occurrence of `value`, by reverse linear scan.
    pub fn last_index_of(&self, value: &S::Value) -> Result<Option<usize>>
    where
        S::Value: PartialEq,
    {
        let mut index = self.len()?;
        for page in self.pages_rev()? {
            let page = page?;
            index -= page.data().len();
            for (offset, value_key) in page.data().iter().enumerate().rev() {
                if let Some(candidate) = self.store.load_value(value_key)? {
                    if candidate == *value {
                        return Ok(Some(index + offset));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Linear-scan membership test.
    pub fn contains(&self, value: &S::Value) -> Result<bool>
    where
        S::Value: PartialEq,
    {
        Ok(self.index_of(value)?.is_some())
    }

    /// Number of values in the list, by linear page scan.
    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for page in self.pages()? {
            count += page?.data().len();
        }
        Ok(count)
    }

    /// True if the head page holds no values.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.head()?.is_empty())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove and return the value at `index`. The page it came from is
    /// merged with a neighbor when their combined size stays below the
    /// page capacity; merging into the predecessor is preferred, and the
    /// head page is never the side that gets deleted.
    pub fn remove_at(&self, index: usize) -> Result<S::Value> {
        let location = self.seek(index)?;
        let value = self.remove_value_at(&location)?;
        self.remove_from(location)?;
        Ok(value)
    }

    /// Remove the first occurrence of `value`. Returns true if found.
    pub fn remove(&self, value: &S::Value) -> Result<bool>
    where
        S::Value: PartialEq,
    {
        match self.index_of(value)? {
            Some(index) => {
                self.remove_at(index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every value and every non-head page, then reset the head to
    /// an empty self-linked page. The head key keeps its identity.
    pub fn clear(&self) -> Result<()> {
        let mut head = self.head()?;

        let mut next_key = first_child(&head)?;
        while next_key != self.head_key {
            let node = self.store.load_node(&next_key)?;
            for value_key in node.data() {
                self.store.remove_value(value_key)?;
            }
            self.store.remove_node(&next_key)?;
            next_key = first_child(&node)?;
        }

        for value_key in head.data() {
            self.store.remove_value(value_key)?;
        }
        head.data_mut().clear();
        head.children_mut()[0] = self.head_key.clone();
        head.ancestors_mut()[0] = self.head_key.clone();
        self.store.store_node(&self.head_key, head)
    }

    /// [`PagedList::clear`], then remove the head key itself. Nothing this
    /// list ever stored remains resolvable afterwards.
    pub fn destroy(&self) -> Result<()> {
        self.clear()?;
        self.store.remove_node(&self.head_key)
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Iterate all values in list order.
    pub fn iter(&self) -> Result<Iter<'_, S>> {
        self.head()?;
        let location = PagedListLocation::load(&self.store, self.head_key.clone())?;
        Ok(Iter {
            store: &self.store,
            head_key: self.head_key.clone(),
            location: Some(location),
        })
    }

    /// Visit every page from the head forward, stopping early when `f`
    /// returns `Ok(false)`. Intended for external maintenance tasks.
    pub fn each_page<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Node<S::UserKey, S::StoreKey>) -> Result<bool>,
    {
        self.head()?;
        let mut next_key = self.head_key.clone();
        loop {
            let node = self.store.load_node(&next_key)?;
            if !f(&node)? {
                return Ok(());
            }
            next_key = first_child(&node)?;
            if next_key == self.head_key {
                return Ok(());
            }
        }
    }

    /// Iterate pages from the head forward.
    pub fn pages(&self) -> Result<Pages<'_, S>> {
        self.head()?;
        Ok(Pages {
            store: &self.store,
            head_key: self.head_key.clone(),
            next_key: Some(self.head_key.clone()),
        })
    }

    /// Iterate pages from the tail backward.
    pub fn pages_rev(&self) -> Result<PagesRev<'_, S>> {
        let head = self.head()?;
        let tail_key = head.ancestors().first().cloned().ok_or_else(|| {
            CanopyError::Storage("head page is missing its prev pointer".to_string())
        })?;
        Ok(PagesRev {
            store: &self.store,
            stop_key: tail_key.clone(),
            next_key: Some(tail_key),
        })
    }

    // =========================================================================
    // Unsupported Surface
    // =========================================================================

    /// Sub-list views are deliberately unimplemented.
    pub fn sub_list(&self, _from_index: usize, _to_index: usize) -> Result<Self> {
        Err(CanopyError::Unsupported(
            "sub-list views are not implemented for paged lists",
        ))
    }

    /// Bidirectional positional iteration is deliberately unimplemented;
    /// only the forward iterator is supported.
    pub fn list_iterator(&self, _index: usize) -> Result<Iter<'_, S>> {
        Err(CanopyError::Unsupported(
            "bidirectional list iteration is not implemented for paged lists",
        ))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The store this list reads and writes through.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The fixed store key of the head page.
    pub fn head_key(&self) -> &S::StoreKey {
        &self.head_key
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Load the head, or create it empty and self-linked if absent. A
    /// loaded head refreshes `page_size` from its persisted capacity.
    fn head(&self) -> Result<Node<S::UserKey, S::StoreKey>> {
        match self.store.load_node(&self.head_key) {
            Ok(head) => {
                self.page_size.set(head.data_cap().max(1));
                Ok(head)
            }
            Err(CanopyError::NodeNotFound(_)) => {
                let head = self.new_page(self.head_key.clone(), self.head_key.clone());
                self.store.store_node(&self.head_key, head.clone())?;
                Ok(head)
            }
            Err(e) => Err(e),
        }
    }

    /// A page linking `prev` and `next`: one child, one ancestor,
    /// `page_size` data slots.
    fn new_page(&self, prev: S::StoreKey, next: S::StoreKey) -> Node<S::UserKey, S::StoreKey> {
        let mut node = Node::new(1, self.page_size.get(), 1);
        node.ancestors_mut().push(prev);
        node.children_mut().push(next);
        node
    }

    /// The last page, positioned one past its last element.
    fn find_last_insertion_point(&self) -> Result<PagedListLocation<'_, S>> {
        self.head()?;
        let head = PagedListLocation::load(&self.store, self.head_key.clone())?;
        let tail = head.prev()?;
        let end = tail.size();
        Ok(tail.at(end))
    }

    /// Walk pages until `index` falls inside one. The index may equal the
    /// list length, which lands one past the last element.
    fn find_insertion_point(&self, index: usize) -> Result<PagedListLocation<'_, S>> {
        self.head()?;
        let mut remaining = index;
        let mut ctx = PagedListLocation::load(&self.store, self.head_key.clone())?;

        while remaining > ctx.size() {
            remaining -= ctx.size();
            ctx = ctx.next()?;
            if *ctx.key() == self.head_key {
                return Err(CanopyError::IndexOutOfBounds {
                    index,
                    size: self.len()?,
                });
            }
        }

        Ok(ctx.at(remaining))
    }

    /// Walk pages until `index` names an existing element. Unlike
    /// [`PagedList::find_insertion_point`] the result always points at a
    /// valid slot.
    fn seek(&self, index: usize) -> Result<PagedListLocation<'_, S>> {
        self.head()?;
        let mut remaining = index;
        let mut ctx = PagedListLocation::load(&self.store, self.head_key.clone())?;

        while remaining >= ctx.size() {
            remaining -= ctx.size();
            ctx = ctx.next()?;
            if *ctx.key() == self.head_key {
                return Err(CanopyError::IndexOutOfBounds {
                    index,
                    size: self.len()?,
                });
            }
        }

        Ok(ctx.at(remaining))
    }

    /// Single-value insert at an already-located position.
    fn add_at<'s>(&'s self, mut ctx: PagedListLocation<'s, S>, value: S::Value) -> Result<()> {
        let value_key = self.store.generate_key(None, Some(&value))?;
        let page_size = self.page_size.get();

        if ctx.size() >= page_size {
            let next = ctx.next()?;
            // Appending just past a full page can slide into the next
            // page when it has room, instead of paying for a new page.
            if next.size() < page_size && ctx.index() == ctx.size() {
                ctx = next.at(0);
            } else {
                ctx = self.next_insertion_point(ctx, next)?;
            }
        }

        let index = ctx.index();
        ctx.node_mut().data_mut().insert(index, value_key.clone());
        ctx.set_index(index + 1);

        self.store.store_value(&value_key, value)?;
        ctx.persist()
    }

    /// Bulk insert at an already-located position. Intermediate pages are
    /// persisted as they fill; the final page is persisted once at the end.
    fn add_all_at<'s>(
        &'s self,
        mut ctx: PagedListLocation<'s, S>,
        values: impl Iterator<Item = S::Value>,
    ) -> Result<bool> {
        let mut added = false;

        for value in values {
            let value_key = self.store.generate_key(None, Some(&value))?;

            if ctx.size() >= self.page_size.get() {
                let next = ctx.next()?;
                ctx = self.next_insertion_point(ctx, next)?;
            }

            let index = ctx.index();
            ctx.node_mut().data_mut().insert(index, value_key.clone());
            ctx.set_index(index + 1);
            self.store.store_value(&value_key, value)?;
            added = true;
        }

        ctx.persist()?;
        Ok(added)
    }

    /// Make room at a full page: appends get a fresh empty page after it,
    /// mid-page inserts split it 50/50 and land in whichever half holds
    /// the insertion offset.
    fn next_insertion_point<'s>(
        &'s self,
        mut ctx: PagedListLocation<'s, S>,
        mut next: PagedListLocation<'s, S>,
    ) -> Result<PagedListLocation<'s, S>> {
        if ctx.index() == ctx.size() {
            // A fresh empty page keeps appends amortized O(1) instead of
            // repeatedly splitting a near-full tail.
            self.insert_page(&ctx, &next)
        } else {
            let insertion_point = ctx.index();
            let new_page = self.split_page(&mut ctx, &mut next)?;
            if insertion_point <= ctx.size() {
                Ok(ctx.at(insertion_point))
            } else {
                let offset = ctx.size();
                Ok(new_page.at(insertion_point - offset))
            }
        }
    }

    /// Link a new empty page between `prev` and `next` and return it.
    fn insert_page<'s>(
        &'s self,
        prev: &PagedListLocation<'s, S>,
        next: &PagedListLocation<'s, S>,
    ) -> Result<PagedListLocation<'s, S>> {
        trace!("inserting an empty page");
        let node = self.new_page(prev.key().clone(), next.key().clone());
        let key = self.store.generate_key(Some(&node), None)?;

        if prev.key() == next.key() {
            // A one-page list: both links of the single neighbor point at
            // the new page, and only one store is needed.
            let mut neighbor = prev.node().clone();
            neighbor.children_mut()[0] = key.clone();
            neighbor.ancestors_mut()[0] = key.clone();
            self.store.store_node(prev.key(), neighbor)?;
        } else {
            let mut prev_node = prev.node().clone();
            prev_node.children_mut()[0] = key.clone();
            self.store.store_node(prev.key(), prev_node)?;

            let mut next_node = next.node().clone();
            next_node.ancestors_mut()[0] = key.clone();
            self.store.store_node(next.key(), next_node)?;
        }

        self.store.store_node(&key, node.clone())?;
        Ok(PagedListLocation::with_node(&self.store, key, node))
    }

    /// Split `ctx`'s page, moving its upper half into a new page inserted
    /// after it. `ctx` is left holding the lower half; `next` should be
    /// discarded by the caller.
    fn split_page<'s>(
        &'s self,
        ctx: &mut PagedListLocation<'s, S>,
        next: &mut PagedListLocation<'s, S>,
    ) -> Result<PagedListLocation<'s, S>> {
        trace!("splitting a full page");
        let mut node = self.new_page(ctx.key().clone(), next.key().clone());
        let key = self.store.generate_key(Some(&node), None)?;

        let half = self.page_size.get() / 2;
        let tail = ctx.node_mut().data_mut().split_off(half);
        *node.data_mut() = tail;

        if ctx.key() == next.key() {
            ctx.node_mut().children_mut()[0] = key.clone();
            ctx.node_mut().ancestors_mut()[0] = key.clone();
            self.store.store_node(ctx.key(), ctx.node().clone())?;
        } else {
            ctx.node_mut().children_mut()[0] = key.clone();
            self.store.store_node(ctx.key(), ctx.node().clone())?;

            next.node_mut().ancestors_mut()[0] = key.clone();
            self.store.store_node(next.key(), next.node().clone())?;
        }

        self.store.store_node(&key, node.clone())?;
        Ok(PagedListLocation::with_node(&self.store, key, node))
    }

    /// Merge `from`'s data into `into` and unlink `from` from the chain.
    /// `after` is the page following `from`; only `into` is left in a
    /// consistent state for further use.
    fn merge<'s>(
        &'s self,
        into: &mut PagedListLocation<'s, S>,
        from: &PagedListLocation<'s, S>,
        after: &mut PagedListLocation<'s, S>,
    ) -> Result<()> {
        // Never merge a page into itself; this also covers one-page lists.
        if into.key() == from.key() {
            return Ok(());
        }
        trace!("merging a page into its predecessor");

        if from.size() > 0 {
            let data = from.node().data().to_vec();
            into.node_mut().data_mut().extend(data);
        }

        if into.key() == after.key() {
            // The merge leaves a single page, which must self-link.
            let key = into.key().clone();
            into.node_mut().children_mut()[0] = key.clone();
            into.node_mut().ancestors_mut()[0] = key;
        } else {
            into.node_mut().children_mut()[0] = after.key().clone();
            let into_key = into.key().clone();
            after.node_mut().ancestors_mut()[0] = into_key;
            after.persist()?;
        }

        into.persist()?;
        from.remove()
    }

    /// Load the value referenced at `location` and delete it from the
    /// store. The page itself is not touched; see
    /// [`PagedList::remove_from`].
    fn remove_value_at(&self, location: &PagedListLocation<'_, S>) -> Result<S::Value> {
        let value_key = match location.data_key() {
            Some(k) => k.clone(),
            None => {
                return Err(CanopyError::IndexOutOfBounds {
                    index: location.index(),
                    size: location.size(),
                })
            }
        };
        let value = self.store.load_value(&value_key)?.ok_or_else(missing_value)?;
        self.store.remove_value(&value_key)?;
        Ok(value)
    }

    /// Drop the slot under `location` and try to merge the shrunken page:
    /// into its predecessor first, else absorb its successor. Returns a
    /// location at the same global list index the removed element held.
    fn remove_from<'s>(
        &'s self,
        mut location: PagedListLocation<'s, S>,
    ) -> Result<PagedListLocation<'s, S>> {
        let index = location.index();
        location.node_mut().data_mut().remove(index);

        let mut prev = location.prev()?;
        let mut next = location.next()?;
        let page_size = self.page_size.get();

        if *location.key() != self.head_key
            && location.size() + prev.size() < page_size
            && location.key() != prev.key()
        {
            let relocated = prev.size() + location.index();
            self.merge(&mut prev, &location, &mut next)?;

            if relocated < prev.size() {
                Ok(prev.at(relocated))
            } else {
                // The removed slot was this page's last; the position now
                // sits at the start of the following page.
                let following = prev.next()?;
                Ok(following.at(0))
            }
        } else if *next.key() != self.head_key
            && location.size() + next.size() < page_size
            && next.key() != location.key()
        {
            let mut after = next.next()?;
            self.merge(&mut location, &next, &mut after)?;
            Ok(location)
        } else {
            location.persist()?;
            Ok(location)
        }
    }
}

fn missing_value() -> CanopyError {
    CanopyError::Storage("value missing for a reference present in the list".to_string())
}

fn first_child<K, SK: Clone>(node: &Node<K, SK>) -> Result<SK> {
    node.children().first().cloned().ok_or_else(|| {
        CanopyError::Storage("page is missing its next pointer".to_string())
    })
}

// =============================================================================
// Iterators
// =============================================================================

/// Value iterator over a [`PagedList`], in list order.
pub struct Iter<'a, S: NodeStore> {
    store: &'a S,
    head_key: S::StoreKey,
    location: Option<PagedListLocation<'a, S>>,
}

impl<'a, S> Iterator for Iter<'a, S>
where
    S: NodeStore<UserKey = <S as NodeStore>::StoreKey>,
{
    type Item = Result<S::Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut location = self.location.take()?;

        // Step over exhausted pages; this also skips a rare empty page
        // left behind when neither neighbor could absorb a removal.
        while location.index() >= location.size() {
            let next_key = match location.next_key() {
                Ok(key) => key,
                Err(e) => return Some(Err(e)),
            };
            if next_key == self.head_key {
                return None;
            }
            location = match PagedListLocation::load(self.store, next_key) {
                Ok(l) => l,
                Err(e) => return Some(Err(e)),
            };
        }

        let value_key = location.data_key()?.clone();
        let result = match self.store.load_value(&value_key) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(missing_value()),
            Err(e) => Err(e),
        };

        location.set_index(location.index() + 1);
        self.location = Some(location);
        Some(result)
    }
}

/// Forward page iterator over a [`PagedList`].
pub struct Pages<'a, S: NodeStore> {
    store: &'a S,
    head_key: S::StoreKey,
    next_key: Option<S::StoreKey>,
}

impl<'a, S: NodeStore> Iterator for Pages<'a, S> {
    type Item = Result<Node<S::UserKey, S::StoreKey>>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next_key.take()?;
        match self.store.load_node(&key) {
            Ok(node) => {
                match node.children().first() {
                    Some(next) if *next != self.head_key => {
                        self.next_key = Some(next.clone());
                    }
                    _ => {}
                }
                Some(Ok(node))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Reverse page iterator over a [`PagedList`], starting at the tail.
pub struct PagesRev<'a, S: NodeStore> {
    store: &'a S,
    stop_key: S::StoreKey,
    next_key: Option<S::StoreKey>,
}

impl<'a, S: NodeStore> Iterator for PagesRev<'a, S> {
    type Item = Result<Node<S::UserKey, S::StoreKey>>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next_key.take()?;
        match self.store.load_node(&key) {
            Ok(node) => {
                match node.ancestors().first() {
                    Some(prev) if *prev != self.stop_key => {
                        self.next_key = Some(prev.clone());
                    }
                    _ => {}
                }
                Some(Ok(node))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
