//! Transaction Module
//!
//! A write-buffering wrapper around any [`crate::store::NodeStore`].
//!
//! ## Responsibilities
//! - Intercept every load/store/remove issued by a tree or list
//! - Coalesce superseded writes so only the last write per key executes
//! - Serve read-your-writes and read-your-deletes from the buffer
//! - Replay the surviving operations in order on commit
//! - Support nested sub-transactions that merge into their parent
//!
//! The wrapper is not a concurrency primitive: it batches one caller's
//! edits and neither detects nor resolves conflicting edits from other
//! callers. It also does not make commit atomic — a backend with its own
//! transactional guarantees must sit underneath for that.

mod operation;
mod transaction;

pub use transaction::Transaction;
