//! Values for the cairn object database.
//!
//! A [`Value`] is an immutable tree of scalars, blobs, lists, maps, structs,
//! and [`Ref`]s to other stored values. Every value has a canonical binary
//! encoding; the hash of that encoding is the value's identity and the key of
//! the chunk that stores it.
//!
//! Refs are the only edges between chunks. A chunk's children are exactly
//! the refs embedded in its value ([`Value::refs`]), which is what graph
//! walks such as pull and ancestry use.
//!
//! # Modules
//!
//! - [`codec`] -- canonical encoding and decoding
//! - [`commit`] -- commit construction and inspection
//! - [`hash_cache`] -- write-once hash caching and the test override hook
//! - [`render`] -- text rendering used by `show`

pub mod codec;
pub mod commit;
pub mod error;
pub mod hash_cache;
pub mod reference;
pub mod render;
pub mod value;

pub use commit::{
    is_commit, new_commit, new_commit_with_meta, parents as commit_parents, value as commit_value,
};
pub use error::{ValueError, ValueResult};
pub use reference::Ref;
pub use value::{Value, ValueData, ValueKind};
