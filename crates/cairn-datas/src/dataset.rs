//! Named datasets and name validation.

use cairn_types::Hash;
use cairn_value::Ref;

use crate::error::{DatasError, DatasResult};

/// A named pointer to a commit, as read from a database root.
///
/// A `Dataset` is a snapshot: it records the head seen when it was read.
/// Head updates go through [`Database`](crate::Database) and return a new
/// snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    id: String,
    head: Option<Ref>,
}

impl Dataset {
    pub(crate) fn new(id: impl Into<String>, head: Option<Ref>) -> Self {
        Self {
            id: id.into(),
            head,
        }
    }

    /// Dataset name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ref to the head commit, if the dataset has one.
    pub fn head(&self) -> Option<&Ref> {
        self.head.as_ref()
    }

    pub fn head_hash(&self) -> Option<Hash> {
        self.head.map(|r| r.target())
    }

    pub fn has_head(&self) -> bool {
        self.head.is_some()
    }
}

/// Validate a dataset name: one or more of `[a-zA-Z0-9_-/]`.
pub fn validate_dataset_name(name: &str) -> DatasResult<()> {
    if name.is_empty() {
        return Err(DatasError::InvalidDatasetName {
            name: name.to_string(),
            reason: "dataset name must not be empty".into(),
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/')))
    {
        return Err(DatasError::InvalidDatasetName {
            name: name.to_string(),
            reason: format!("contains forbidden character: {bad:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["main", "my-data_set", "team/alpha", "A1", "-"] {
            assert!(validate_dataset_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "has space", "dot.name", "colon:x", "hash#1", "ümlaut"] {
            assert!(
                matches!(
                    validate_dataset_name(name),
                    Err(DatasError::InvalidDatasetName { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn snapshot_accessors() {
        let ds = Dataset::new("main", None);
        assert_eq!(ds.id(), "main");
        assert!(!ds.has_head());
        assert!(ds.head_hash().is_none());
    }
}
