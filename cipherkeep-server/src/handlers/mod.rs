//! Request handlers.

pub mod accounts;
pub mod items;
pub mod sync;

use crate::auth::AuthUser;
use crate::error::ApiError;
use axum::http::Extensions;

/// The authenticated caller placed by the auth middleware.
fn caller(extensions: &Extensions) -> Result<&AuthUser, ApiError> {
    extensions
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::Unauthorized("No authenticated user".to_string()))
}
