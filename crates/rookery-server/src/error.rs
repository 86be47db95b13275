//! Error types for the page server.
//!
//! [`PageError`] converts into an Axum response with a small JSON body.
//! The isolation headers are added afterwards by whichever mechanism the
//! runtime uses, so error responses carry them like any other.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur while answering a page request.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// No page, data endpoint, or file matches the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The page data could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(path) => (StatusCode::NOT_FOUND, format!("no route for {path}")),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
