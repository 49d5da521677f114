use std::fmt;
use std::sync::OnceLock;

use bytes::Bytes;

use crate::hash::Hash;

/// The atomic unit of storage: an immutable payload and its content hash.
///
/// The hash is derived from the payload the first time it is asked for and
/// cached afterwards. Two chunks with the same bytes always have the same
/// hash and are the same stored object.
#[derive(Clone)]
pub struct Chunk {
    data: Bytes,
    hash: OnceLock<Hash>,
}

impl Chunk {
    /// Create a chunk from a payload. The hash is computed lazily.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            hash: OnceLock::new(),
        }
    }

    /// Create a chunk whose hash is already known (e.g. from a store index).
    ///
    /// The hash is trusted, not recomputed. Use [`Chunk::verify`] when the
    /// source is not trusted.
    pub fn with_hash(hash: Hash, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            hash: OnceLock::from(hash),
        }
    }

    /// A chunk with no payload.
    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// Content hash of the payload.
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| Hash::of(&self.data))
    }

    /// The payload bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Recompute the hash from the payload and compare it with `expected`.
    pub fn verify(&self, expected: &Hash) -> bool {
        Hash::of(&self.data) == *expected
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Chunk {}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("hash", &self.hash())
            .field("len", &self.data.len())
            .finish()
    }
}
