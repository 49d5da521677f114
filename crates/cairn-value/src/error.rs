use cairn_types::Hash;

use crate::value::ValueKind;

/// Errors from decoding or inspecting values.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// The bytes are not a valid canonical encoding.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value had a different kind than the caller required.
    #[error("expected {expected}, got {actual}")]
    UnexpectedKind {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// A struct is missing a required field.
    #[error("struct {name} has no field {field}")]
    MissingField { name: String, field: String },

    /// The value is not a commit.
    #[error("value {0} is not a commit")]
    NotACommit(Hash),
}

/// Result alias for value operations.
pub type ValueResult<T> = Result<T, ValueError>;
