use async_trait::async_trait;
use cairn_types::{Chunk, Hash, FORMAT_VERSION};

use crate::error::{StoreError, StoreResult};

/// Content-addressed chunk storage with a single compare-and-swap root.
///
/// All implementations must satisfy these invariants:
/// - `get` and `has` report absence as `Ok(None)` / `Ok(false)`, never as an
///   error. Errors mean I/O failure or corruption.
/// - `put` may buffer, but every chunk put before a successful
///   `update_root` is durable once that call returns.
/// - Putting a chunk that is already stored is a no-op for stored content.
/// - `update_root(new, expected)` swaps the root iff it currently equals
///   `expected`. Of several racing callers with the same `expected`,
///   exactly one wins. A lost race is `Ok(false)`, not an error.
/// - A fresh store's root is [`Hash::empty`].
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Read a chunk by hash.
    async fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>>;

    /// Check whether a chunk exists.
    async fn has(&self, hash: &Hash) -> StoreResult<bool>;

    /// Stage a chunk under its hash.
    async fn put(&self, chunk: Chunk) -> StoreResult<()>;

    /// The current root, or the empty sentinel.
    async fn root(&self) -> StoreResult<Hash>;

    /// Compare-and-swap the root. Returns whether the swap happened.
    async fn update_root(&self, new: Hash, expected: Hash) -> StoreResult<bool>;

    /// Store format version tag.
    fn version(&self) -> &str;

    /// Flush buffered puts and release resources.
    async fn close(&self) -> StoreResult<()>;

    /// Check existence of several chunks.
    ///
    /// Default implementation calls `has()` for each hash. Remote backends
    /// override this to save round-trips.
    async fn has_many(&self, hashes: &[Hash]) -> StoreResult<Vec<bool>> {
        let mut out = Vec::with_capacity(hashes.len());
        for hash in hashes {
            out.push(self.has(hash).await?);
        }
        Ok(out)
    }

    /// Read several chunks.
    async fn get_many(&self, hashes: &[Hash]) -> StoreResult<Vec<Option<Chunk>>> {
        let mut out = Vec::with_capacity(hashes.len());
        for hash in hashes {
            out.push(self.get(hash).await?);
        }
        Ok(out)
    }
}

/// Fail unless `store` speaks [`FORMAT_VERSION`].
pub fn check_version(store: &dyn ChunkStore) -> StoreResult<()> {
    if store.version() == FORMAT_VERSION {
        Ok(())
    } else {
        Err(StoreError::VersionMismatch {
            expected: FORMAT_VERSION.to_string(),
            actual: store.version().to_string(),
        })
    }
}
