//! Wire types shared by the server and the client.

use cairn_types::{Hash, FORMAT_VERSION};
use serde::{Deserialize, Serialize};

/// Response header carrying the store format version.
pub const VERSION_HEADER: &str = "x-cairn-version";

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub format_version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            format_version: FORMAT_VERSION.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootResponse {
    pub root: Hash,
}

/// Compare-and-swap request for the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRootRequest {
    pub new: Hash,
    pub expected: Hash,
}

/// Outcome of a root CAS, with the root as it stands afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRootResponse {
    pub swapped: bool,
    pub root: Hash,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasRequest {
    pub hashes: Vec<Hash>,
}

/// One flag per requested hash, in request order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasResponse {
    pub present: Vec<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
