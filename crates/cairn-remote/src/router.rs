use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderValue;
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use cairn_store::ChunkStore;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};
use crate::protocol::VERSION_HEADER;

/// Build the axum router exposing `store`.
pub fn build_router(store: Arc<dyn ChunkStore>, max_chunk_size: usize) -> Router {
    let state = AppState { store };
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/version", get(handler::version_handler))
        .route(
            "/v1/root",
            get(handler::get_root_handler).post(handler::update_root_handler),
        )
        .route(
            "/v1/chunks/:hash",
            get(handler::get_chunk_handler).put(handler::put_chunk_handler),
        )
        .route("/v1/has", post(handler::has_handler))
        .layer(DefaultBodyLimit::max(max_chunk_size))
        .layer(middleware::map_response_with_state(
            state.clone(),
            add_version_header,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn add_version_header(State(state): State<AppState>, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(state.store.version()) {
        response.headers_mut().insert(VERSION_HEADER, value);
    }
    response
}
