//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors returned by the HTTP surface.
///
/// Authentication failures are not errors here: they are reported in the
/// response body with status 200.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A header is present but not valid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The request body could not be read or parsed.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The session header names no live session.
    #[error("unknown session")]
    UnknownSession,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    /// HTTP status for the error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidHeader(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownSession => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
