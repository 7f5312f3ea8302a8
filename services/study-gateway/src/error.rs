//! HTTP-facing error types
//!
//! Every error response has the shape
//! `{"error":{"type":"..","message":"..","request_id":"req_.."}}`.
//! Exhaustion responses also carry `"source":"exhausted"` at the top level.
//! Raw upstream causes are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Generation(#[from] key_pool::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Generation(key_pool::Error::AllSourcesExhausted { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Generation(key_pool::Error::EmptyPool) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Generation(key_pool::Error::AllSourcesExhausted { .. }) => {
                "all_sources_exhausted"
            }
            ApiError::Generation(key_pool::Error::EmptyPool) => "configuration_error",
        }
    }

    /// Render as a JSON response tagged with `request_id`.
    pub fn into_response_with_id(self, request_id: &str) -> Response {
        let status = self.status();
        let mut error = serde_json::json!({
            "type": self.error_type(),
            "request_id": request_id,
        });

        let body = match &self {
            ApiError::InvalidRequest(msg) => {
                error["message"] = msg.clone().into();
                serde_json::json!({ "error": error })
            }
            ApiError::Generation(err @ key_pool::Error::AllSourcesExhausted { .. }) => {
                error["message"] = err.user_message().into();
                serde_json::json!({ "error": error, "source": "exhausted" })
            }
            ApiError::Generation(err @ key_pool::Error::EmptyPool) => {
                error["message"] = err.user_message().into();
                serde_json::json!({ "error": error })
            }
        };

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
