//! Commit values.
//!
//! A commit is a struct named `Commit` with a `parents` field holding a list
//! of refs to earlier commits, a `value` field holding the committed value,
//! and an optional `meta` field. Parents are sorted and deduplicated so the
//! same history always produces the same commit hash.

use cairn_types::Hash;

use crate::error::{ValueError, ValueResult};
use crate::reference::Ref;
use crate::value::{Value, ValueData};

pub const COMMIT_STRUCT: &str = "Commit";
pub const PARENTS_FIELD: &str = "parents";
pub const VALUE_FIELD: &str = "value";
pub const META_FIELD: &str = "meta";

/// Build a commit of `value` on top of `parents`.
pub fn new_commit(value: Value, parents: impl IntoIterator<Item = Ref>) -> Value {
    build(value, parents, None)
}

/// Build a commit carrying a metadata value.
pub fn new_commit_with_meta(
    value: Value,
    parents: impl IntoIterator<Item = Ref>,
    meta: Value,
) -> Value {
    build(value, parents, Some(meta))
}

fn build(value: Value, parents: impl IntoIterator<Item = Ref>, meta: Option<Value>) -> Value {
    let mut parents: Vec<Ref> = parents.into_iter().collect();
    parents.sort_by_key(|r| r.target());
    parents.dedup_by_key(|r| r.target());

    let mut fields = vec![
        (
            PARENTS_FIELD,
            Value::list(parents.into_iter().map(Value::reference)),
        ),
        (VALUE_FIELD, value),
    ];
    if let Some(meta) = meta {
        fields.push((META_FIELD, meta));
    }
    Value::structure(COMMIT_STRUCT, fields)
}

/// Returns `true` if `value` has the shape of a commit.
pub fn is_commit(value: &Value) -> bool {
    match value.data() {
        ValueData::Struct { name, fields } if name == COMMIT_STRUCT => {
            fields.contains_key(VALUE_FIELD)
                && fields
                    .get(PARENTS_FIELD)
                    .and_then(|p| p.as_list().ok())
                    .is_some_and(|items| items.iter().all(|i| i.as_ref_value().is_ok()))
        }
        _ => false,
    }
}

fn require_commit(value: &Value) -> ValueResult<()> {
    if is_commit(value) {
        Ok(())
    } else {
        Err(ValueError::NotACommit(value.hash()))
    }
}

/// Parent refs of a commit.
pub fn parents(commit: &Value) -> ValueResult<Vec<Ref>> {
    require_commit(commit)?;
    commit
        .field(PARENTS_FIELD)?
        .as_list()?
        .iter()
        .map(Value::as_ref_value)
        .collect()
}

/// Parent hashes of a commit.
pub fn parent_hashes(commit: &Value) -> ValueResult<Vec<Hash>> {
    Ok(parents(commit)?.iter().map(Ref::target).collect())
}

/// The committed value.
pub fn value(commit: &Value) -> ValueResult<Value> {
    require_commit(commit)?;
    commit.field(VALUE_FIELD).cloned()
}

/// The metadata value, if any.
pub fn meta(commit: &Value) -> ValueResult<Option<Value>> {
    require_commit(commit)?;
    Ok(commit.get(META_FIELD).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_commit_has_no_parents() {
        let c = new_commit(Value::from("v1"), []);
        assert!(is_commit(&c));
        assert!(parents(&c).unwrap().is_empty());
        assert_eq!(value(&c).unwrap().as_str().unwrap(), "v1");
        assert!(meta(&c).unwrap().is_none());
        assert_eq!(Ref::new(&c).height(), 1);
    }

    #[test]
    fn parent_is_lower_than_child() {
        let c1 = new_commit(Value::from("v1"), []);
        let r1 = Ref::new(&c1);
        let c2 = new_commit(Value::from("v2"), [r1]);
        let r2 = Ref::new(&c2);
        assert!(r2.height() > r1.height());
        assert_eq!(parent_hashes(&c2).unwrap(), vec![c1.hash()]);
    }

    #[test]
    fn parents_are_sorted_and_deduplicated() {
        let a = Ref::new(&new_commit(Value::from("a"), []));
        let b = Ref::new(&new_commit(Value::from("b"), []));
        let c1 = new_commit(Value::from("m"), [a, b, a]);
        let c2 = new_commit(Value::from("m"), [b, a]);
        assert_eq!(c1.hash(), c2.hash());
        assert_eq!(parents(&c1).unwrap().len(), 2);
    }

    #[test]
    fn meta_is_kept() {
        let c = new_commit_with_meta(Value::from(1.0), [], Value::from("note"));
        assert_eq!(meta(&c).unwrap().unwrap().as_str().unwrap(), "note");
    }

    #[test]
    fn non_commits_are_rejected() {
        let plain = Value::structure("Commit", [("value", Value::from(1.0))]);
        assert!(!is_commit(&plain));
        assert!(!is_commit(&Value::from("x")));
        assert!(matches!(parents(&plain), Err(ValueError::NotACommit(_))));
    }
}
