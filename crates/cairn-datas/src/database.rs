use std::collections::BTreeMap;
use std::sync::Arc;

use cairn_store::ChunkStore;
use cairn_types::Hash;
use cairn_value::{codec, commit, Ref, Value, ValueData};
use tracing::{debug, info, warn};

use crate::ancestry;
use crate::config::RetryPolicy;
use crate::dataset::{validate_dataset_name, Dataset};
use crate::error::{DatasError, DatasResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeadUpdate {
    FastForward,
    Force,
}

/// A versioned database over a [`ChunkStore`].
///
/// The store's root chunk is a map from dataset name to a ref of that
/// dataset's head commit. Every head change builds a new map, writes it,
/// and installs it with one `update_root` compare-and-swap. A lost race
/// re-reads the root, re-checks the update against the fresh heads, and
/// tries again, up to the [`RetryPolicy`] bound.
pub struct Database {
    store: Arc<dyn ChunkStore>,
    retry: RetryPolicy,
}

impl Database {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: Arc<dyn ChunkStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// The underlying chunk store.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// All datasets and their heads.
    pub async fn datasets(&self) -> DatasResult<BTreeMap<String, Ref>> {
        let root = self.store.root().await?;
        self.load_root_map(root).await
    }

    /// Read a dataset. A dataset that was never written has no head.
    pub async fn get_dataset(&self, name: &str) -> DatasResult<Dataset> {
        validate_dataset_name(name)?;
        let head = self.datasets().await?.get(name).copied();
        Ok(Dataset::new(name, head))
    }

    /// Read and decode the value stored under `hash`.
    ///
    /// The chunk's content is re-hashed and must match `hash`.
    pub async fn read_value(&self, hash: &Hash) -> DatasResult<Option<Value>> {
        let Some(chunk) = self.store.get(hash).await? else {
            return Ok(None);
        };
        if !chunk.verify(hash) {
            return Err(DatasError::Corruption {
                hash: *hash,
                reason: "stored content does not match its hash".into(),
            });
        }
        Ok(Some(codec::decode_chunk(&chunk)?))
    }

    /// Write a value and return a ref to it.
    pub async fn write_value(&self, value: &Value) -> DatasResult<Ref> {
        self.store.put(value.to_chunk()).await?;
        Ok(Ref::new(value))
    }

    /// Value of the dataset's head commit.
    pub async fn head_value(&self, ds: &Dataset) -> DatasResult<Option<Value>> {
        match ds.head() {
            None => Ok(None),
            Some(head) => {
                let commit = self.load_commit(head).await?;
                Ok(Some(commit::value(&commit)?))
            }
        }
    }

    /// Commit `value` on top of the dataset's current head.
    pub async fn commit(&self, ds: &Dataset, value: Value) -> DatasResult<Dataset> {
        let current = self.get_dataset(ds.id()).await?;
        let commit = commit::new_commit(value, current.head().copied());
        let head = self.write_value(&commit).await?;
        self.fast_forward(&current, head).await
    }

    /// Move the dataset head to `new_head` if it descends from the current
    /// head. Divergent history fails with [`DatasError::MergeNeeded`] and
    /// leaves the head unchanged.
    pub async fn fast_forward(&self, ds: &Dataset, new_head: Ref) -> DatasResult<Dataset> {
        self.update_head(ds.id(), new_head, HeadUpdate::FastForward)
            .await
    }

    /// Move the dataset head to `new_head` unconditionally.
    pub async fn set_head(&self, ds: &Dataset, new_head: Ref) -> DatasResult<Dataset> {
        self.update_head(ds.id(), new_head, HeadUpdate::Force).await
    }

    /// Flush and close the underlying store.
    pub async fn close(&self) -> DatasResult<()> {
        self.store.close().await?;
        Ok(())
    }

    pub(crate) async fn load_commit(&self, r: &Ref) -> DatasResult<Value> {
        let hash = r.target();
        let value = self
            .read_value(&hash)
            .await?
            .ok_or(DatasError::MissingChunk(hash))?;
        if !commit::is_commit(&value) {
            return Err(DatasError::NotACommit(hash));
        }
        Ok(value)
    }

    async fn load_root_map(&self, root: Hash) -> DatasResult<BTreeMap<String, Ref>> {
        if root.is_empty() {
            return Ok(BTreeMap::new());
        }
        let value = self
            .read_value(&root)
            .await?
            .ok_or(DatasError::MissingChunk(root))?;
        let ValueData::Map(entries) = value.data() else {
            return Err(DatasError::MalformedRoot {
                hash: root,
                reason: format!("expected map, got {}", value.kind()),
            });
        };
        entries
            .iter()
            .map(|(name, v)| {
                v.as_ref_value()
                    .map(|r| (name.clone(), r))
                    .map_err(|e| DatasError::MalformedRoot {
                        hash: root,
                        reason: format!("dataset {name}: {e}"),
                    })
            })
            .collect()
    }

    async fn update_head(
        &self,
        name: &str,
        new_head: Ref,
        mode: HeadUpdate,
    ) -> DatasResult<Dataset> {
        validate_dataset_name(name)?;
        self.load_commit(&new_head).await?;

        let attempts = self.retry.attempts();
        for attempt in 1..=attempts {
            let root = self.store.root().await?;
            let mut heads = self.load_root_map(root).await?;
            let current = heads.get(name).copied();

            if current.map(|r| r.target()) == Some(new_head.target()) {
                debug!(dataset = name, head = %new_head, "head already in place");
                return Ok(Dataset::new(name, Some(new_head)));
            }

            if mode == HeadUpdate::FastForward {
                if let Some(current) = current {
                    if !ancestry::is_ancestor(self, &current, &new_head).await? {
                        return Err(DatasError::MergeNeeded {
                            dataset: name.to_string(),
                            current: current.target(),
                            proposed: new_head.target(),
                        });
                    }
                }
            }

            heads.insert(name.to_string(), new_head);
            let root_value = Value::map(
                heads
                    .into_iter()
                    .map(|(k, r)| (k, Value::reference(r))),
            );
            self.store.put(root_value.to_chunk()).await?;

            if self.store.update_root(root_value.hash(), root).await? {
                info!(
                    dataset = name,
                    head = %new_head,
                    ?mode,
                    attempt,
                    "dataset head updated"
                );
                return Ok(Dataset::new(name, Some(new_head)));
            }

            debug!(dataset = name, attempt, "root changed underneath us; retrying");
            if attempt < attempts {
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        warn!(
            dataset = name,
            attempts,
            "root CAS retry limit exceeded"
        );
        Err(DatasError::RetryLimitExceeded {
            dataset: name.to_string(),
            attempts,
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("version", &self.store.version())
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use cairn_store::{MemoryChunkStore, StoreResult};
    use cairn_types::Chunk;
    use cairn_value::hash_cache::override_hash;

    use super::*;

    fn mem_db() -> Database {
        Database::new(Arc::new(MemoryChunkStore::new()))
    }

    async fn write_commit(db: &Database, value: &str, parents: &[Ref]) -> Ref {
        let c = commit::new_commit(Value::from(value), parents.iter().copied());
        db.write_value(&c).await.unwrap()
    }

    #[tokio::test]
    async fn fresh_database_has_no_datasets() {
        let db = mem_db();
        assert!(db.datasets().await.unwrap().is_empty());
        let ds = db.get_dataset("main").await.unwrap();
        assert!(!ds.has_head());
        assert!(db.head_value(&ds).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fast_forward_from_empty_head() {
        let db = mem_db();
        let ds = db.get_dataset("main").await.unwrap();
        let c1 = write_commit(&db, "v1", &[]).await;
        let ds = db.fast_forward(&ds, c1).await.unwrap();
        assert_eq!(ds.head(), Some(&c1));

        let reread = db.get_dataset("main").await.unwrap();
        assert_eq!(reread.head(), Some(&c1));
        let v = db.head_value(&reread).await.unwrap().unwrap();
        assert_eq!(v.as_str().unwrap(), "v1");
    }

    #[tokio::test]
    async fn fast_forward_to_descendant() {
        let db = mem_db();
        let ds = db.get_dataset("main").await.unwrap();
        let c1 = write_commit(&db, "v1", &[]).await;
        let c2 = write_commit(&db, "v2", &[c1]).await;
        let c3 = write_commit(&db, "v3", &[c2]).await;
        let ds = db.fast_forward(&ds, c1).await.unwrap();
        let ds = db.fast_forward(&ds, c3).await.unwrap();
        assert_eq!(ds.head_hash(), Some(c3.target()));
    }

    #[tokio::test]
    async fn diverged_history_needs_merge() {
        let db = mem_db();
        let ds = db.get_dataset("main").await.unwrap();
        let base = write_commit(&db, "base", &[]).await;
        let left = write_commit(&db, "left", &[base]).await;
        let right = write_commit(&db, "right", &[base]).await;
        let ds = db.fast_forward(&ds, left).await.unwrap();

        let err = db.fast_forward(&ds, right).await.unwrap_err();
        assert!(matches!(err, DatasError::MergeNeeded { .. }));
        let head = db.get_dataset("main").await.unwrap();
        assert_eq!(head.head(), Some(&left));

        // Rewinding to an ancestor is not a fast-forward either.
        let err = db.fast_forward(&ds, base).await.unwrap_err();
        assert!(matches!(err, DatasError::MergeNeeded { .. }));
    }

    #[tokio::test]
    async fn set_head_discards_history() {
        let db = mem_db();
        let ds = db.get_dataset("main").await.unwrap();
        let a = write_commit(&db, "a", &[]).await;
        let b = write_commit(&db, "b", &[]).await;
        let ds = db.fast_forward(&ds, a).await.unwrap();
        let ds = db.set_head(&ds, b).await.unwrap();
        assert_eq!(ds.head(), Some(&b));
        assert_eq!(db.get_dataset("main").await.unwrap().head(), Some(&b));
    }

    #[tokio::test]
    async fn commit_chains_on_current_head() {
        let db = mem_db();
        let ds = db.get_dataset("data").await.unwrap();
        let ds1 = db.commit(&ds, Value::number(1.0)).await.unwrap();
        // Committing from a stale snapshot still builds on the stored head.
        let ds2 = db.commit(&ds, Value::number(2.0)).await.unwrap();
        let head = db.load_commit(ds2.head().unwrap()).await.unwrap();
        assert_eq!(
            commit::parent_hashes(&head).unwrap(),
            vec![ds1.head_hash().unwrap()]
        );
    }

    #[tokio::test]
    async fn datasets_are_independent() {
        let db = mem_db();
        let a = write_commit(&db, "a", &[]).await;
        let b = write_commit(&db, "b", &[]).await;
        db.fast_forward(&db.get_dataset("one").await.unwrap(), a)
            .await
            .unwrap();
        db.fast_forward(&db.get_dataset("two").await.unwrap(), b)
            .await
            .unwrap();
        let all = db.datasets().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["one"], a);
        assert_eq!(all["two"], b);
    }

    #[tokio::test]
    async fn head_must_be_a_stored_commit() {
        let db = mem_db();
        let ds = db.get_dataset("main").await.unwrap();

        let plain = db.write_value(&Value::from("not a commit")).await.unwrap();
        let err = db.fast_forward(&ds, plain).await.unwrap_err();
        assert!(matches!(err, DatasError::NotACommit(_)));

        let unstored = Ref::new(&commit::new_commit(Value::from("x"), []));
        let err = db.set_head(&ds, unstored).await.unwrap_err();
        assert!(matches!(err, DatasError::MissingChunk(_)));
    }

    #[tokio::test]
    async fn invalid_dataset_name_is_rejected() {
        let db = mem_db();
        assert!(matches!(
            db.get_dataset("bad name").await,
            Err(DatasError::InvalidDatasetName { .. })
        ));
    }

    #[tokio::test]
    async fn read_value_detects_corruption() {
        let db = mem_db();
        let fake = Hash::of(b"not the real content");
        let value = {
            let _guard = override_hash(move |_| fake);
            Value::from("tampered")
        };
        db.write_value(&value).await.unwrap();
        let err = db.read_value(&fake).await.unwrap_err();
        assert!(matches!(err, DatasError::Corruption { .. }));
        assert!(db.read_value(&Hash::of(b"absent")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_from_same_root() {
        let store: Arc<dyn ChunkStore> = Arc::new(MemoryChunkStore::new());
        let db = Arc::new(Database::new(Arc::clone(&store)));
        let ds = db.get_dataset("main").await.unwrap();
        let r1 = write_commit(&db, "r1", &[]).await;
        let ds = db.fast_forward(&ds, r1).await.unwrap();
        let r2 = write_commit(&db, "r2", &[r1]).await;
        let r3 = write_commit(&db, "r3", &[r1]).await;

        let (db2, ds2) = (Arc::clone(&db), ds.clone());
        let t2 = tokio::spawn(async move { db2.fast_forward(&ds2, r2).await });
        let (db3, ds3) = (Arc::clone(&db), ds.clone());
        let t3 = tokio::spawn(async move { db3.fast_forward(&ds3, r3).await });
        let res2 = t2.await.unwrap();
        let res3 = t3.await.unwrap();

        // r2 and r3 are siblings: whoever lands second sees a diverged head.
        assert!(res2.is_ok() != res3.is_ok());
        let loser = if res2.is_ok() { res3 } else { res2 };
        assert!(matches!(loser, Err(DatasError::MergeNeeded { .. })));

        let head = db.get_dataset("main").await.unwrap().head_hash().unwrap();
        assert_ne!(head, r1.target());
        assert!(head == r2.target() || head == r3.target());
    }

    /// Store whose root CAS always loses.
    struct ContendedStore(MemoryChunkStore);

    #[async_trait]
    impl ChunkStore for ContendedStore {
        async fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
            self.0.get(hash).await
        }
        async fn has(&self, hash: &Hash) -> StoreResult<bool> {
            self.0.has(hash).await
        }
        async fn put(&self, chunk: Chunk) -> StoreResult<()> {
            self.0.put(chunk).await
        }
        async fn root(&self) -> StoreResult<Hash> {
            self.0.root().await
        }
        async fn update_root(&self, _new: Hash, _expected: Hash) -> StoreResult<bool> {
            Ok(false)
        }
        fn version(&self) -> &str {
            self.0.version()
        }
        async fn close(&self) -> StoreResult<()> {
            self.0.close().await
        }
    }

    #[tokio::test]
    async fn retry_limit_is_enforced() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let db = Database::with_retry_policy(
            Arc::new(ContendedStore(MemoryChunkStore::new())),
            policy,
        );
        let ds = db.get_dataset("main").await.unwrap();
        let c = write_commit(&db, "v", &[]).await;
        let err = db.fast_forward(&ds, c).await.unwrap_err();
        assert!(matches!(
            err,
            DatasError::RetryLimitExceeded { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn zero_attempt_policy_still_commits() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let db = Database::with_retry_policy(Arc::new(MemoryChunkStore::new()), policy);
        let ds = db.get_dataset("main").await.unwrap();
        let ds = db.commit(&ds, Value::from("v")).await.unwrap();
        assert!(ds.has_head());

        let contended = Database::with_retry_policy(
            Arc::new(ContendedStore(MemoryChunkStore::new())),
            RetryPolicy {
                max_attempts: 0,
                ..RetryPolicy::default()
            },
        );
        let ds = contended.get_dataset("main").await.unwrap();
        let c = write_commit(&contended, "v", &[]).await;
        let err = contended.fast_forward(&ds, c).await.unwrap_err();
        assert!(matches!(
            err,
            DatasError::RetryLimitExceeded { attempts: 1, .. }
        ));
    }
}
