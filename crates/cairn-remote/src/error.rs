use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use cairn_store::StoreError;

use crate::protocol::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The request could not be understood (server side).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The peer answered with an unexpected status (client side).
    #[error("unexpected response ({status}): {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The peer answered with a well-formed but inconsistent body.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("version mismatch: expected {expected}, server has {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

impl IntoResponse for RemoteError {
    fn into_response(self) -> Response {
        let status = match &self {
            RemoteError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RemoteError::Store(StoreError::Corruption { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            RemoteError::Store(StoreError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// Client failures surface through the ChunkStore interface.
impl From<RemoteError> for StoreError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Store(e) => e,
            RemoteError::VersionMismatch { expected, actual } => {
                StoreError::VersionMismatch { expected, actual }
            }
            other => StoreError::Transport(other.to_string()),
        }
    }
}
