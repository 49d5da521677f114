use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use cairn_types::{Chunk, Hash, FORMAT_VERSION};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ChunkStore;

/// In-memory, HashMap-based chunk store.
///
/// Backs `mem` databases and tests. Chunks live behind a `RwLock` and the
/// root behind a `Mutex`, which is what makes `update_root` atomic.
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<Hash, Chunk>>,
    root: Mutex<Hash>,
    puts: AtomicU64,
    closed: AtomicBool,
}

impl MemoryChunkStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            root: Mutex::new(Hash::empty()),
            puts: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of `put` calls, including re-puts of stored chunks.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Number of distinct chunks stored.
    pub fn len(&self) -> usize {
        self.chunks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no chunks are stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().expect("lock poisoned").is_empty()
    }

    /// Total payload bytes across all stored chunks.
    pub fn total_bytes(&self) -> u64 {
        self.chunks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|c| c.len() as u64)
            .sum()
    }

    /// Sorted list of all stored hashes.
    pub fn all_hashes(&self) -> Vec<Hash> {
        let map = self.chunks.read().expect("lock poisoned");
        let mut hashes: Vec<Hash> = map.keys().copied().collect();
        hashes.sort();
        hashes
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
        self.ensure_open()?;
        Ok(self.chunks.read().expect("lock poisoned").get(hash).cloned())
    }

    async fn has(&self, hash: &Hash) -> StoreResult<bool> {
        self.ensure_open()?;
        Ok(self.chunks.read().expect("lock poisoned").contains_key(hash))
    }

    async fn put(&self, chunk: Chunk) -> StoreResult<()> {
        self.ensure_open()?;
        self.puts.fetch_add(1, Ordering::Relaxed);
        let hash = chunk.hash();
        let mut map = self.chunks.write().expect("lock poisoned");
        map.entry(hash).or_insert(chunk);
        Ok(())
    }

    async fn root(&self) -> StoreResult<Hash> {
        self.ensure_open()?;
        Ok(*self.root.lock().expect("lock poisoned"))
    }

    async fn update_root(&self, new: Hash, expected: Hash) -> StoreResult<bool> {
        self.ensure_open()?;
        let mut root = self.root.lock().expect("lock poisoned");
        if *root != expected {
            let current = *root;
            debug!(%current, %expected, "root CAS rejected");
            return Ok(false);
        }
        *root = new;
        debug!(%new, "root updated");
        Ok(true)
    }

    fn version(&self) -> &str {
        FORMAT_VERSION
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChunkStore")
            .field("chunk_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryChunkStore::new();
        let input = "abc";
        let chunk = Chunk::new(input.as_bytes().to_vec());
        store.put(chunk.clone()).await.unwrap();

        let h = chunk.hash();
        assert_eq!(h.to_string(), "rmnjb8cjc5tblj21ed4qs821649eduie");
        let back = store.get(&h).await.unwrap().unwrap();
        assert_eq!(back.data().as_ref(), input.as_bytes());
        assert!(store.has(&h).await.unwrap());
    }

    #[tokio::test]
    async fn missing_chunk_is_absent_not_error() {
        let store = MemoryChunkStore::new();
        let h = Hash::of(b"nope");
        assert!(store.get(&h).await.unwrap().is_none());
        assert!(!store.has(&h).await.unwrap());
    }

    #[tokio::test]
    async fn root_cas() {
        let store = MemoryChunkStore::new();
        let old = store.root().await.unwrap();
        assert!(old.is_empty());

        let chunk = Chunk::new(b"abc".to_vec());
        store.put(chunk.clone()).await.unwrap();
        assert!(store.update_root(chunk.hash(), old).await.unwrap());
        assert_eq!(store.root().await.unwrap(), chunk.hash());

        // Stale expected root is rejected.
        let other = Chunk::new(b"def".to_vec());
        store.put(other.clone()).await.unwrap();
        assert!(!store.update_root(other.hash(), old).await.unwrap());
        assert_eq!(store.root().await.unwrap(), chunk.hash());

        // Correct expected root succeeds.
        assert!(store.update_root(other.hash(), chunk.hash()).await.unwrap());
        assert_eq!(store.root().await.unwrap(), other.hash());
    }

    #[tokio::test]
    async fn put_counts_every_call() {
        let store = MemoryChunkStore::new();
        store.put(Chunk::new(b"abc".to_vec())).await.unwrap();
        assert_eq!(store.put_count(), 1);
        store.put(Chunk::new(b"abc".to_vec())).await.unwrap();
        assert_eq!(store.put_count(), 2);
        store.put(Chunk::new(b"def".to_vec())).await.unwrap();
        assert_eq!(store.put_count(), 3);
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cas_has_one_winner() {
        let store = Arc::new(MemoryChunkStore::new());
        let r1 = Hash::of(b"r1");
        assert!(store.update_root(r1, Hash::empty()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.update_root(Hash::of(&[i]), r1).await.unwrap()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_ne!(store.root().await.unwrap(), r1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_chunk_puts_store_one_copy() {
        let store = Arc::new(MemoryChunkStore::new());
        let chunk = Chunk::new(b"same".to_vec());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            let chunk = chunk.clone();
            handles.push(tokio::spawn(async move { store.put(chunk).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.put_count(), 32);
        assert_eq!(store.get(&chunk.hash()).await.unwrap().unwrap(), chunk);
    }

    #[tokio::test]
    async fn batch_helpers() {
        let store = MemoryChunkStore::new();
        let a = Chunk::new(b"a".to_vec());
        store.put(a.clone()).await.unwrap();
        let missing = Hash::of(b"b");
        assert_eq!(
            store.has_many(&[a.hash(), missing]).await.unwrap(),
            vec![true, false]
        );
        let got = store.get_many(&[missing, a.hash()]).await.unwrap();
        assert!(got[0].is_none());
        assert_eq!(got[1].as_ref().unwrap(), &a);
        assert_eq!(store.all_hashes(), vec![a.hash()]);
    }

    #[tokio::test]
    async fn closed_store_rejects_use() {
        let store = MemoryChunkStore::new();
        store.close().await.unwrap();
        assert!(matches!(
            store.get(&Hash::empty()).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            store.put(Chunk::empty()).await,
            Err(StoreError::Closed)
        ));
        assert_eq!(store.version(), FORMAT_VERSION);
    }
}
