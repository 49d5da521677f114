//! Chunk storage for cairn.
//!
//! Every backend implements [`ChunkStore`]: a hash-keyed map of immutable
//! chunks plus one mutable root hash that only changes through
//! compare-and-swap.
//!
//! # Storage Backends
//!
//! - [`MemoryChunkStore`] -- `HashMap`-based store for tests and `mem` databases
//! - [`FileChunkStore`] -- append-only chunk log plus an atomically replaced manifest
//!
//! The HTTP backend lives in `cairn-remote`.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileChunkStore;
pub use memory::MemoryChunkStore;
pub use traits::{check_version, ChunkStore};
