//! API error types.

use crate::token::TokenError;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use cipherkeep_core::sync::models::ErrorBody;
use cipherkeep_core::{CryptoError, StoreError};
use thiserror::Error;

/// Largest plain-text error body carried over into the JSON envelope.
const MAX_REJECTION_BODY: usize = 64 * 1024;

/// Server error types mapped to HTTP status codes.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(e) => (StatusCode::BAD_REQUEST, e.clone()),
            Self::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e.clone()),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            Self::Conflict(e) => (StatusCode::CONFLICT, e.clone()),
            Self::Unavailable(e) => {
                tracing::warn!("Store unavailable: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Temporarily unavailable, retry later".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Wrap error responses produced outside the handlers (extractor
/// rejections, the body limit, unmatched methods) in the `{"error": ..}` body.
pub async fn json_error_body(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let message = match axum::body::to_bytes(body, MAX_REJECTION_BODY).await {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).trim().to_string(),
        _ => status.canonical_reason().unwrap_or("Error").to_string(),
    };
    let bytes = match serde_json::to_vec(&ErrorBody { error: message }) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to encode error body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(bytes))
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => Self::BadRequest(msg),
            StoreError::NameConflict | StoreError::VersionConflict | StoreError::AlreadyExists => {
                Self::Conflict(e.to_string())
            }
            StoreError::NotFound => Self::NotFound,
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        Self::Unauthorized(e.to_string())
    }
}

impl From<CryptoError> for ApiError {
    fn from(e: CryptoError) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status() {
        let cases = [
            (StoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (StoreError::NameConflict, StatusCode::CONFLICT),
            (StoreError::VersionConflict, StatusCode::CONFLICT),
            (StoreError::AlreadyExists, StatusCode::CONFLICT),
            (StoreError::NotFound, StatusCode::NOT_FOUND),
            (StoreError::Unavailable("busy".into()), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Backend("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
