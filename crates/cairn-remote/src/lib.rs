//! HTTP transport for cairn.
//!
//! [`ChunkServer`] exposes any [`ChunkStore`](cairn_store::ChunkStore) over
//! HTTP and [`HttpChunkStore`] implements the same trait against such a
//! server, so a remote database behaves exactly like a local one: absent
//! chunks are `None`, puts are idempotent, and the root changes only by
//! compare-and-swap.
//!
//! # Endpoints
//!
//! | Method | Path | Body |
//! |---|---|---|
//! | GET | `/v1/health` | [`HealthResponse`] |
//! | GET | `/v1/version` | [`VersionResponse`] |
//! | GET | `/v1/root` | [`RootResponse`] |
//! | POST | `/v1/root` | [`UpdateRootRequest`] -> [`UpdateRootResponse`] |
//! | GET | `/v1/chunks/:hash` | raw chunk bytes, or 404 |
//! | PUT | `/v1/chunks/:hash` | raw chunk bytes; must hash to `:hash` |
//! | POST | `/v1/has` | [`HasRequest`] -> [`HasResponse`] |
//!
//! Every response carries the store format version in
//! [`VERSION_HEADER`].

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod router;
pub mod server;

pub use client::HttpChunkStore;
pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::{RemoteError, RemoteResult};
pub use protocol::{
    HasRequest, HasResponse, HealthResponse, RootResponse, UpdateRootRequest, UpdateRootResponse,
    VersionResponse, VERSION_HEADER,
};
pub use server::ChunkServer;
