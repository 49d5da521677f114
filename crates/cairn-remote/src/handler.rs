use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use cairn_store::{ChunkStore, StoreError};
use cairn_types::{Chunk, Hash};
use tracing::debug;

use crate::error::{RemoteError, RemoteResult};
use crate::protocol::{
    HasRequest, HasResponse, HealthResponse, RootResponse, UpdateRootRequest, UpdateRootResponse,
    VersionResponse,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChunkStore>,
}

fn parse_hash(s: &str) -> RemoteResult<Hash> {
    Hash::parse(s).map_err(|e| RemoteError::BadRequest(e.to_string()))
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn version_handler(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.store.version().to_string(),
    })
}

pub async fn get_root_handler(State(state): State<AppState>) -> RemoteResult<Json<RootResponse>> {
    let root = state.store.root().await?;
    Ok(Json(RootResponse { root }))
}

pub async fn update_root_handler(
    State(state): State<AppState>,
    Json(req): Json<UpdateRootRequest>,
) -> RemoteResult<Json<UpdateRootResponse>> {
    let swapped = state.store.update_root(req.new, req.expected).await?;
    let root = state.store.root().await?;
    debug!(swapped, %root, "remote root update");
    Ok(Json(UpdateRootResponse { swapped, root }))
}

pub async fn get_chunk_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> RemoteResult<Response> {
    let hash = parse_hash(&hash)?;
    match state.store.get(&hash).await? {
        Some(chunk) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            chunk.data().clone(),
        )
            .into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// Store a chunk. The body must hash to the hash in the path.
pub async fn put_chunk_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    body: Bytes,
) -> RemoteResult<StatusCode> {
    let hash = parse_hash(&hash)?;
    let chunk = Chunk::new(body);
    if chunk.hash() != hash {
        return Err(RemoteError::Store(StoreError::Corruption {
            hash,
            reason: format!("body hashes to {}", chunk.hash()),
        }));
    }
    state.store.put(chunk).await?;
    Ok(StatusCode::CREATED)
}

pub async fn has_handler(
    State(state): State<AppState>,
    Json(req): Json<HasRequest>,
) -> RemoteResult<Json<HasResponse>> {
    let present = state.store.has_many(&req.hashes).await?;
    Ok(Json(HasResponse { present }))
}
