use std::path::PathBuf;

use cairn_types::Hash;

/// Errors from chunk store operations.
///
/// A missing chunk is not an error: lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data does not match its hash or framing.
    #[error("corrupt chunk {hash}: {reason}")]
    Corruption { hash: Hash, reason: String },

    /// The store was written by an incompatible format version.
    #[error("version mismatch: expected {expected}, store has {actual}")]
    VersionMismatch { expected: String, actual: String },

    /// Another handle holds the store directory.
    #[error("store at {} is already open elsewhere", .0.display())]
    Locked(PathBuf),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// Failure talking to a remote store.
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
