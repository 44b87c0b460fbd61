//! HTTP mapping for pipeline errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use eventfeed_shared::EventFeedError;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `QUOTA_EXCEEDED` or `INTERNAL_ERROR`.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// A failed on-demand run.
#[derive(Debug)]
pub struct ApiError(pub EventFeedError);

impl From<EventFeedError> for ApiError {
    fn from(e: EventFeedError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = if self.0.is_quota() {
            (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        };

        let message = self.0.to_string();
        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "event request failed");
        } else {
            tracing::warn!(status = %status, code, error = %message, "event request rejected");
        }

        let body = ErrorResponse {
            error: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
