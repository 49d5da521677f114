//! Datasets, head management, and pull for cairn.
//!
//! A [`Database`] wraps a [`ChunkStore`](cairn_store::ChunkStore) whose root
//! chunk maps dataset names to head commits. Heads move by
//! [`Database::fast_forward`] (only to descendants) or
//! [`Database::set_head`] (unconditionally), both funnelled through one
//! bounded compare-and-swap loop on the store root.
//!
//! [`pull`] copies the chunk graph under a ref from one store to another
//! with bounded parallelism, reporting [`PullProgress`] over a channel.

pub mod ancestry;
pub mod config;
pub mod database;
pub mod dataset;
pub mod error;
pub mod progress;
pub mod pull;

pub use config::{RetryPolicy, DEFAULT_PARALLELISM, MAX_ANCESTRY_VISITS};
pub use database::Database;
pub use dataset::{validate_dataset_name, Dataset};
pub use error::{DatasError, DatasResult};
pub use progress::{PullProgress, PullSummary};
pub use pull::pull;
