//! Error types for CanopyKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CanopyError
pub type Result<T> = std::result::Result<T, CanopyError>;

/// Unified error type for CanopyKV operations
#[derive(Debug, Error)]
pub enum CanopyError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    /// A node expected to exist is missing. Structural absence signals
    /// storage corruption or a lost update, so it is fatal and never
    /// retried at this layer. Value absence is not an error; see
    /// [`crate::store::NodeStore::load_value`].
    #[error("node not found: {0}")]
    NodeNotFound(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    /// The underlying storage medium failed (I/O, network, timeout inside a
    /// backend). Propagated, never swallowed.
    #[error("storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    /// Wire-format or payload encoding/decoding failure.
    #[error("codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // API Errors
    // -------------------------------------------------------------------------
    /// The caller invoked a deliberately unimplemented API.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A caller-supplied position exceeds the collection's current size.
    #[error("index {index} out of bounds for size {size}")]
    IndexOutOfBounds { index: usize, size: usize },
}
