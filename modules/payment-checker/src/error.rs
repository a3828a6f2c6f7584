//! Uniform API response envelope and error mapping for the admin HTTP
//! surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing bearer token")]
    Unauthorized,
    #[error("bearer token mismatch")]
    Forbidden,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error("unexpected error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct Envelope<T> {
    status: &'static str,
    entity: &'static str,
    state: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body: Envelope<()> = Envelope {
            status: "failed",
            entity: "payment_record",
            state: "error",
            message: self.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Wraps a successful payload in the `{status, entity, state, message, data}`
/// envelope every admin route returns.
pub fn success<T: Serialize>(entity: &'static str, state: &'static str, data: T) -> Response {
    let body = Envelope {
        status: "success",
        entity,
        state,
        message: "ok".to_string(),
        data: Some(data),
    };
    (StatusCode::OK, Json(body)).into_response()
}
