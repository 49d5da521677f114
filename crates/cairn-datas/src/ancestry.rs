//! Commit ancestry checks used by fast-forward.

use std::collections::{HashSet, VecDeque};

use cairn_value::{commit, Ref};
use tracing::warn;

use crate::config::MAX_ANCESTRY_VISITS;
use crate::database::Database;
use crate::error::DatasResult;

/// Returns `true` if `ancestor` is `descendant` or reachable from it through
/// commit parents.
///
/// Breadth-first walk with a visited set. Parents never have a greater
/// height than their children, so any commit whose height is not above the
/// ancestor's cannot lead to it and is not expanded. The walk stops after
/// [`MAX_ANCESTRY_VISITS`] commits and reports `false`.
pub async fn is_ancestor(db: &Database, ancestor: &Ref, descendant: &Ref) -> DatasResult<bool> {
    is_ancestor_bounded(db, ancestor, descendant, MAX_ANCESTRY_VISITS).await
}

pub(crate) async fn is_ancestor_bounded(
    db: &Database,
    ancestor: &Ref,
    descendant: &Ref,
    max_visits: usize,
) -> DatasResult<bool> {
    let target = ancestor.target();
    if descendant.target() == target {
        return Ok(true);
    }

    let mut visited = HashSet::new();
    visited.insert(descendant.target());
    let mut queue = VecDeque::from([*descendant]);

    while let Some(current) = queue.pop_front() {
        if visited.len() > max_visits {
            warn!(
                ancestor = %ancestor,
                descendant = %descendant,
                visited = visited.len(),
                "ancestry walk hit its bound; treating as diverged"
            );
            return Ok(false);
        }

        let value = db.load_commit(&current).await?;
        for parent in commit::parents(&value)? {
            if parent.target() == target {
                return Ok(true);
            }
            if parent.height() > ancestor.height() && visited.insert(parent.target()) {
                queue.push_back(parent);
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cairn_store::MemoryChunkStore;
    use cairn_value::Value;

    use super::*;

    async fn chain(db: &Database, len: usize) -> Vec<Ref> {
        let mut refs: Vec<Ref> = Vec::new();
        for i in 0..len {
            let c = commit::new_commit(Value::number(i as f64), refs.last().copied());
            refs.push(db.write_value(&c).await.unwrap());
        }
        refs
    }

    #[tokio::test]
    async fn linear_history() {
        let db = Database::new(Arc::new(MemoryChunkStore::new()));
        let refs = chain(&db, 5).await;
        assert!(is_ancestor(&db, &refs[0], &refs[4]).await.unwrap());
        assert!(is_ancestor(&db, &refs[3], &refs[4]).await.unwrap());
        assert!(is_ancestor(&db, &refs[2], &refs[2]).await.unwrap());
        assert!(!is_ancestor(&db, &refs[4], &refs[0]).await.unwrap());
    }

    #[tokio::test]
    async fn merge_commit_reaches_both_sides() {
        let db = Database::new(Arc::new(MemoryChunkStore::new()));
        let base = chain(&db, 1).await[0];
        let left = db
            .write_value(&commit::new_commit(Value::from("l"), [base]))
            .await
            .unwrap();
        let right = db
            .write_value(&commit::new_commit(Value::from("r"), [base]))
            .await
            .unwrap();
        let merge = db
            .write_value(&commit::new_commit(Value::from("m"), [left, right]))
            .await
            .unwrap();
        assert!(is_ancestor(&db, &left, &merge).await.unwrap());
        assert!(is_ancestor(&db, &right, &merge).await.unwrap());
        assert!(is_ancestor(&db, &base, &merge).await.unwrap());
        assert!(!is_ancestor(&db, &left, &right).await.unwrap());
    }

    #[tokio::test]
    async fn bound_fails_closed() {
        let db = Database::new(Arc::new(MemoryChunkStore::new()));
        let refs = chain(&db, 10).await;
        assert!(!is_ancestor_bounded(&db, &refs[0], &refs[9], 3).await.unwrap());
        assert!(is_ancestor_bounded(&db, &refs[0], &refs[9], 20).await.unwrap());
    }
}
