//! Deferred operations
//!
//! One log entry per load, store, or remove issued through a
//! [`super::Transaction`]. A later operation on the same key marks the
//! earlier one deleted: the slot stays in the log as a placeholder so
//! ordering is preserved, but its payload is discarded and it is skipped
//! at commit.

/// What a buffered operation will do at commit time.
///
/// Cached reads replay as no-ops; they exist so repeated loads inside one
/// transaction never re-fetch, and so buffered state is readable before
/// commit.
#[derive(Debug)]
pub(crate) enum OperationKind<N, V> {
    StoreValue(V),
    StoreNode(N),
    RemoveValue,
    RemoveNode,
    ReadValue(Option<V>),
    ReadNode(N),
    /// A superseded operation whose payload has been discarded.
    Placeholder,
}

/// A single entry in a transaction's operation log.
#[derive(Debug)]
pub(crate) struct Operation<SK, N, V> {
    pub(crate) key: SK,
    pub(crate) kind: OperationKind<N, V>,
    deleted: bool,
}

impl<SK, N, V> Operation<SK, N, V> {
    pub(crate) fn new(key: SK, kind: OperationKind<N, V>) -> Self {
        Self {
            key,
            kind,
            deleted: false,
        }
    }

    /// Mark this operation superseded: drop its payload and keep the slot
    /// as an inert placeholder.
    pub(crate) fn delete(&mut self) {
        self.deleted = true;
        self.kind = OperationKind::Placeholder;
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted
    }
}
