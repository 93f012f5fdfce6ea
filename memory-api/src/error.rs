//! Maps [`memory_core::Error`] onto HTTP responses per the propagation
//! policy: `Validation`, `FactNotFound`, `NotImplemented` and
//! `StorageUnavailable`/`TransientDependencyFailure` surface directly with
//! their documented status codes; everything else is logged with context
//! and returned as an opaque `500`, matching the teacher's
//! `(StatusCode, String)` error-tuple convention in `akh-medu-server`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use memory_core::Error;
use serde_json::json;
use tracing::error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::FactNotFound(fact_type) => {
                (StatusCode::NOT_FOUND, format!("no fact of type {fact_type:?} found"))
            }
            Error::NotImplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg.clone()),
            Error::StorageUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Error::TransientDependencyFailure(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Error::NotFound(id) => (StatusCode::NOT_FOUND, format!("no episode with id {id}")),
            Error::StorageConflict(msg) => {
                error!(error = %msg, "unretried storage conflict surfaced to caller");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            other => {
                error!(error = %other, "unhandled internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Validation helper for handlers that need to reject a request before ever
/// touching storage (unknown enum values, malformed query params).
pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(Error::Validation(message.into()))
}

pub fn bad_request_on_unknown_preference(value: &str) -> ApiError {
    bad_request(format!("unknown hybrid preference {value:?}"))
}
