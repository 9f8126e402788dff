//! Transactional NodeStore
//!
//! [`Transaction`] implements [`NodeStore`] by buffering every operation in
//! an ordered log, so a `BTree` or `PagedList` built over a transaction
//! defers all of its storage traffic until `commit`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{CanopyError, Result};
use crate::node::Node;
use crate::store::NodeStore;

use super::operation::{Operation, OperationKind};

type TxOperation<S> = Operation<
    <S as NodeStore>::StoreKey,
    Node<<S as NodeStore>::UserKey, <S as NodeStore>::StoreKey>,
    <S as NodeStore>::Value,
>;

/// Buffered state: the ordered log plus per-kind key indexes into it.
///
/// The indexes always point at the latest live operation for a key; a
/// superseded log slot is marked deleted in place so replay order never
/// shifts.
struct TxInner<S: NodeStore> {
    log: Vec<TxOperation<S>>,
    values: HashMap<S::StoreKey, usize>,
    nodes: HashMap<S::StoreKey, usize>,
}

impl<S: NodeStore> TxInner<S> {
    fn new() -> Self {
        Self {
            log: Vec::new(),
            values: HashMap::new(),
            nodes: HashMap::new(),
        }
    }

    fn clear(&mut self) {
        self.log.clear();
        self.values.clear();
        self.nodes.clear();
    }

    /// Append a value-keyed operation, superseding any live operation
    /// already indexed under the same key.
    fn push_value(&mut self, op: TxOperation<S>) {
        let key = op.key.clone();
        if let Some(&prior) = self.values.get(&key) {
            self.log[prior].delete();
        }
        let slot = self.log.len();
        self.log.push(op);
        self.values.insert(key, slot);
    }

    /// Append a node-keyed operation, superseding any live operation
    /// already indexed under the same key.
    fn push_node(&mut self, op: TxOperation<S>) {
        let key = op.key.clone();
        if let Some(&prior) = self.nodes.get(&key) {
            self.log[prior].delete();
        }
        let slot = self.log.len();
        self.log.push(op);
        self.nodes.insert(key, slot);
    }
}

/// A transaction over a [`NodeStore`].
///
/// Every `store`/`remove` is deferred; every `load` is answered from the
/// buffer when possible and cached when it falls through. `commit` replays
/// the surviving operations in original order against the underlying store.
///
/// A mid-commit error propagates immediately: operations already replayed
/// stay applied, the rest stay buffered. Callers needing atomicity must
/// back this wrapper with a store that provides it.
pub struct Transaction<'a, S: NodeStore> {
    store: &'a S,
    parent: Option<&'a Transaction<'a, S>>,
    inner: Mutex<TxInner<S>>,
    scope_depth: AtomicUsize,
}

impl<'a, S: NodeStore> Transaction<'a, S> {
    /// Open a transaction against the given store.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            parent: None,
            inner: Mutex::new(TxInner::new()),
            scope_depth: AtomicUsize::new(0),
        }
    }

    /// Number of operations currently buffered, superseded slots included.
    pub fn pending_operations(&self) -> usize {
        self.inner.lock().log.len()
    }

    // =========================================================================
    // Commit / Rollback
    // =========================================================================

    /// Execute every surviving operation in original log order, then clear
    /// all buffers, leaving the transaction ready for reuse.
    ///
    /// On error the buffers are left intact so the caller can inspect or
    /// roll back; nothing past the failing operation has executed.
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        trace!(operations = inner.log.len(), "replaying transaction log");

        for op in &inner.log {
            if op.is_deleted() {
                continue;
            }
            match &op.kind {
                OperationKind::StoreValue(value) => {
                    self.store.store_value(&op.key, value.clone())?
                }
                OperationKind::StoreNode(node) => self.store.store_node(&op.key, node.clone())?,
                OperationKind::RemoveValue => self.store.remove_value(&op.key)?,
                OperationKind::RemoveNode => self.store.remove_node(&op.key)?,
                OperationKind::ReadValue(_)
                | OperationKind::ReadNode(_)
                | OperationKind::Placeholder => {}
            }
        }

        inner.clear();
        Ok(())
    }

    /// Discard all buffered operations without executing anything.
    pub fn rollback(&self) {
        self.inner.lock().clear();
    }

    // =========================================================================
    // Nesting
    // =========================================================================

    /// Run `f` against a child transaction chained to this one for cache
    /// lookups. When `f` returns `Ok`, the child's log and indexes are
    /// merged wholesale into this transaction; on `Err` the child is
    /// discarded.
    pub fn sub_transaction<R>(
        &self,
        f: impl FnOnce(&Transaction<'_, S>) -> Result<R>,
    ) -> Result<R> {
        let child = Transaction {
            store: self.store,
            parent: Some(self),
            inner: Mutex::new(TxInner::new()),
            scope_depth: AtomicUsize::new(0),
        };

        let result = f(&child)?;

        let child_inner = child.inner.into_inner();
        let mut inner = self.inner.lock();
        let offset = inner.log.len();
        inner.log.extend(child_inner.log);
        for (key, slot) in child_inner.values {
            inner.values.insert(key, offset + slot);
        }
        for (key, slot) in child_inner.nodes {
            inner.nodes.insert(key, offset + slot);
        }

        Ok(result)
    }

    /// Run `f` inside a commit scope.
    ///
    /// Scopes nest by a depth counter; only the outermost scope acts on
    /// exit, committing once on success and rolling back on error. This is
    /// the explicit form of "commit after the outermost call" semantics.
    pub fn scope<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        self.scope_depth.fetch_add(1, Ordering::SeqCst);
        let result = f(self);
        let prior = self.scope_depth.fetch_sub(1, Ordering::SeqCst);

        if prior > 1 {
            return result;
        }

        match result {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    // =========================================================================
    // Buffer Lookup
    // =========================================================================

    /// Answer a value load from this transaction or any ancestor.
    /// `None` means no buffered operation covers the key.
    fn buffered_value(&self, key: &S::StoreKey) -> Option<Option<S::Value>> {
        {
            let inner = self.inner.lock();
            if let Some(&slot) = inner.values.get(key) {
                return match &inner.log[slot].kind {
                    OperationKind::StoreValue(value) => Some(Some(value.clone())),
                    OperationKind::ReadValue(value) => Some(value.clone()),
                    OperationKind::RemoveValue => Some(None),
                    _ => None,
                };
            }
        }
        self.parent.and_then(|p| p.buffered_value(key))
    }

    /// Answer a node load from this transaction or any ancestor.
    /// `None` means no buffered operation covers the key.
    fn buffered_node(
        &self,
        key: &S::StoreKey,
    ) -> Option<Result<Node<S::UserKey, S::StoreKey>>> {
        {
            let inner = self.inner.lock();
            if let Some(&slot) = inner.nodes.get(key) {
                return match &inner.log[slot].kind {
                    OperationKind::StoreNode(node) => Some(Ok(node.clone())),
                    OperationKind::ReadNode(node) => Some(Ok(node.clone())),
                    OperationKind::RemoveNode => Some(Err(CanopyError::NodeNotFound(
                        "node removed in open transaction".to_string(),
                    ))),
                    _ => None,
                };
            }
        }
        self.parent.and_then(|p| p.buffered_node(key))
    }
}

impl<'a, S: NodeStore> NodeStore for Transaction<'a, S> {
    type UserKey = S::UserKey;
    type StoreKey = S::StoreKey;
    type Value = S::Value;

    fn load_value(&self, key: &Self::StoreKey) -> Result<Option<Self::Value>> {
        if let Some(answer) = self.buffered_value(key) {
            return Ok(answer);
        }

        // Cache the fallthrough, absent results included, so repeated reads
        // within this transaction never re-fetch.
        let value = self.store.load_value(key)?;
        let mut inner = self.inner.lock();
        inner.push_value(Operation::new(
            key.clone(),
            OperationKind::ReadValue(value.clone()),
        ));
        Ok(value)
    }

    fn load_node(&self, key: &Self::StoreKey) -> Result<Node<Self::UserKey, Self::StoreKey>> {
        if let Some(answer) = self.buffered_node(key) {
            return answer;
        }

        let node = self.store.load_node(key)?;
        let mut inner = self.inner.lock();
        inner.push_node(Operation::new(
            key.clone(),
            OperationKind::ReadNode(node.clone()),
        ));
        Ok(node)
    }

    fn store_value(&self, key: &Self::StoreKey, value: Self::Value) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.push_value(Operation::new(key.clone(), OperationKind::StoreValue(value)));
        Ok(())
    }

    fn store_node(
        &self,
        key: &Self::StoreKey,
        node: Node<Self::UserKey, Self::StoreKey>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.push_node(Operation::new(key.clone(), OperationKind::StoreNode(node)));
        Ok(())
    }

    fn remove_node(&self, key: &Self::StoreKey) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.push_node(Operation::new(key.clone(), OperationKind::RemoveNode));
        Ok(())
    }

    fn remove_value(&self, key: &Self::StoreKey) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.push_value(Operation::new(key.clone(), OperationKind::RemoveValue));
        Ok(())
    }

    fn generate_key(
        &self,
        node: Option<&Node<Self::UserKey, Self::StoreKey>>,
        value: Option<&Self::Value>,
    ) -> Result<Self::StoreKey> {
        self.store.generate_key(node, value)
    }

    fn convert(&self, key: &Self::UserKey) -> Result<Self::StoreKey> {
        self.store.convert(key)
    }
}
