//! Bearer token middleware.

use crate::error::ApiError;
use crate::server::AppState;
use crate::token;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use cipherkeep_core::StoreError;
use uuid::Uuid;

/// Identity of the caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Auth middleware: validates the bearer token on every authenticated request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = token::validate(token.trim(), &state.token_secret, Utc::now()).map_err(|e| {
        tracing::warn!("Rejected token: {}", e);
        ApiError::from(e)
    })?;

    // The token may outlive the account, e.g. after a throwaway store restarts
    let user = state.users.find_by_id(claims.sub).map_err(|e| match e {
        StoreError::NotFound => ApiError::Unauthorized("Unknown user".to_string()),
        other => other.into(),
    })?;

    request.extensions_mut().insert(AuthUser { id: user.id });

    Ok(next.run(request).await)
}
