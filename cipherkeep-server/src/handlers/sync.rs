//! Pull sync handler.

use crate::error::ApiError;
use crate::handlers::caller;
use crate::server::AppState;
use axum::extract::State;
use axum::http::Extensions;
use axum::Json;
use cipherkeep_core::sync::models::{SyncRequest, SyncResponse};

pub async fn sync(
    State(state): State<AppState>,
    extensions: Extensions,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    let user = caller(&extensions)?;

    let batch = state.sync.sync(user.id, req.since)?;
    tracing::info!(
        "Sync for {}: {} items, has_more={}",
        user.id,
        batch.items.len(),
        batch.has_more
    );

    Ok(Json(batch.into()))
}
