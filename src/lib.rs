//! # CanopyKV
//!
//! Out-of-core, pointer-based data structures persisted through pluggable
//! key/value storage:
//! - A balanced B-tree with bidirectional cursors and range selection
//! - A circular paged list with index-based access
//! - A write-buffering transaction layer that batches and coalesces
//!   storage traffic
//!
//! Every node access goes through the [`store::NodeStore`] abstraction, so
//! the same tree can live in memory, on a filesystem, or in any
//! document-oriented store that can implement six operations.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │       BTree         │   │      PagedList      │
//! │ (cursors, select)   │   │ (pages, iteration)  │
//! └──────────┬──────────┘   └──────────┬──────────┘
//!            │                         │
//!            ▼                         ▼
//! ┌─────────────────────────────────────────────────┐
//! │               NodeStore (trait)                  │
//! │   load / store / remove  ·  convert  ·  genkey   │
//! └──────────┬──────────────────────────┬───────────┘
//!            │ (optional)               │
//! ┌──────────▼──────────┐   ┌──────────▼──────────┐
//! │     Transaction     │   │      Backends       │
//! │ (buffer, coalesce,  │──▶│  MemoryNodeStore    │
//! │  replay on commit)  │   │  DirectoryNodeStore │
//! └─────────────────────┘   └─────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Single-threaded and synchronous: no internal locking of the structures,
//! no suspension points, no retries. Callers serialize access to a given
//! tree or list externally, or back it with a store that resolves
//! conflicting edits itself. The transaction layer batches one caller's
//! edits; it is not a concurrency primitive.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod node;
pub mod store;
pub mod tx;
pub mod btree;
pub mod list;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CanopyError, Result};
pub use config::{BTreeConfig, PagedListConfig};
pub use node::Node;
pub use store::{DirectoryNodeStore, MemoryNodeStore, NodeStore};
pub use tx::Transaction;
pub use btree::{BTree, BTreeLocation, Selection};
pub use list::{PagedList, PagedListLocation};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CanopyKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
