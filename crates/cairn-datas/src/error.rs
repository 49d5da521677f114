use cairn_store::StoreError;
use cairn_types::Hash;
use cairn_value::ValueError;

/// Errors from database, dataset, and pull operations.
#[derive(Debug, thiserror::Error)]
pub enum DatasError {
    /// The new head does not descend from the current head.
    #[error("merge needed: dataset {dataset} is at {current}, which is not an ancestor of {proposed}")]
    MergeNeeded {
        dataset: String,
        current: Hash,
        proposed: Hash,
    },

    /// The root compare-and-swap kept losing races.
    #[error("gave up updating dataset {dataset} after {attempts} attempts")]
    RetryLimitExceeded { dataset: String, attempts: u32 },

    /// The dataset name is not allowed.
    #[error("invalid dataset name {name:?}: {reason}")]
    InvalidDatasetName { name: String, reason: String },

    /// A head must point at a commit.
    #[error("{0} is not a commit")]
    NotACommit(Hash),

    /// A chunk that must exist could not be found.
    #[error("missing chunk {0}")]
    MissingChunk(Hash),

    /// A chunk's content does not match the hash it was requested by.
    #[error("corrupt chunk {hash}: {reason}")]
    Corruption { hash: Hash, reason: String },

    /// The root chunk does not have the shape of a dataset map.
    #[error("malformed root {hash}: {reason}")]
    MalformedRoot { hash: Hash, reason: String },

    /// The pull was stopped by the caller.
    #[error("pull cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Result alias for dataset operations.
pub type DatasResult<T> = Result<T, DatasError>;
