//! HTTP mapping for review errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dcr_common::Error;
use serde_json::json;
use tracing::{error, warn};

/// Error returned by every fallible handler
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError(Error::Validation(message.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError(Error::Internal(message.into()))
    }

    /// Status code and short machine-readable kind
    pub fn status(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::Schema(_) => (StatusCode::BAD_REQUEST, "schema"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Error::Query(_) => (StatusCode::BAD_REQUEST, "query"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::NoMatches(_) => (StatusCode::NOT_FOUND, "no_matches"),
            Error::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status();
        let message = self.0.to_string();

        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Request rejected: {}", message);
        }

        let body = Json(json!({
            "error": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}
