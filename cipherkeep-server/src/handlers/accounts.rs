//! Registration and login.

use crate::error::ApiError;
use crate::server::AppState;
use crate::token::{self, Claims};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use cipherkeep_core::store::validate_name;
use cipherkeep_core::sync::models::{AuthRequest, AuthResponse};
use cipherkeep_core::{hash_credential, verify_credential, StoreError, User};

const INVALID_CREDENTIALS: &str = "invalid credentials";

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_name(&req.username).map_err(ApiError::from)?;
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }

    let password = req.password.into_bytes();
    let hash = tokio::task::spawn_blocking(move || hash_credential(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let user = state.users.register(&req.username, &hash)?;
    tracing::info!("Registered account {}", user.id);

    Ok((StatusCode::CREATED, Json(issue_for(&state, &user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    // Unknown user and wrong password look the same to the caller
    let user = match state.users.find_by_name(&req.username) {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            tracing::warn!("Login failed for unknown account");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let password = req.password.into_bytes();
    let hash = user.credential_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_credential(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    if !verified {
        tracing::warn!("Login failed for account {}", user.id);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!("Account {} logged in", user.id);
    Ok(Json(issue_for(&state, &user)?))
}

fn issue_for(state: &AppState, user: &User) -> Result<AuthResponse, ApiError> {
    let claims = Claims::new(user.id, &user.name, Utc::now(), state.token_ttl);
    let token = token::issue(&claims, &state.token_secret)
        .map_err(|e| ApiError::Internal(format!("Token issue failed: {}", e)))?;

    Ok(AuthResponse {
        user_id: user.id,
        token,
    })
}
