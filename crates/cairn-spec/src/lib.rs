//! Command-line spellings for cairn databases and values.
//!
//! A database is named by `mem`, a local path (`file:` prefix optional), an
//! `http(s)://` url, or an alias from `.cairnconfig`. Paths add `::` and a
//! dataset or `#hash`, with optional `.field` steps.

pub mod config;
pub mod error;
pub mod resolver;
pub mod spec;

pub use config::{CairnConfig, DbEntry, LoadedConfig, CONFIG_FILE_NAME};
pub use error::{SpecError, SpecResult};
pub use resolver::{discover, open_store, Resolver};
pub use spec::{split_spec, DatabaseSpec, PathRoot, ValuePath};
