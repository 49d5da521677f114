//! Foundation types for cairn.
//!
//! Every other cairn crate depends on `cairn-types`. It defines the identity
//! of stored data and nothing else: no I/O, no encoding of higher level
//! values.
//!
//! # Key Types
//!
//! - [`Hash`] -- 20 byte SHA-512 prefix with a base32 text form
//! - [`Chunk`] -- immutable payload plus its lazily computed [`Hash`]
//! - [`FORMAT_VERSION`] -- store format tag checked when a store is opened

pub mod chunk;
pub mod error;
pub mod hash;

pub use chunk::Chunk;
pub use error::TypeError;
pub use hash::Hash;

/// Store format version.
///
/// Any store reporting a different version is incompatible; there is no
/// negotiation.
pub const FORMAT_VERSION: &str = "cairn-1";
