//! Item CRUD handlers.

use crate::error::ApiError;
use crate::handlers::caller;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{Extensions, StatusCode};
use axum::Json;
use cipherkeep_core::sync::models::{
    CreateItemRequest, ItemRecord, UpdateItemRequest, UpdateItemResponse,
};
use cipherkeep_core::{ItemKind, ItemUpdate, NewItem};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    extensions: Extensions,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemRecord>), ApiError> {
    let user = caller(&extensions)?;

    let item = state.items.create(NewItem {
        owner_id: user.id,
        kind: req.kind,
        name: req.name,
        ciphertext: req.ciphertext,
        tags: req.tags,
    })?;
    tracing::info!("Item {} created by {}", item.id, user.id);

    Ok((StatusCode::CREATED, Json(item.into())))
}

pub async fn list(
    State(state): State<AppState>,
    extensions: Extensions,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ItemRecord>>, ApiError> {
    let user = caller(&extensions)?;

    let kind = match query.kind.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            ItemKind::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown item kind '{}'", raw)))?,
        ),
    };

    let items = state.items.list(user.id, kind)?;
    Ok(Json(items.into_iter().map(ItemRecord::from).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    extensions: Extensions,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemRecord>, ApiError> {
    let user = caller(&extensions)?;
    let item = state.items.get_by_id(user.id, id)?;
    Ok(Json(item.into()))
}

pub async fn get_by_name(
    State(state): State<AppState>,
    extensions: Extensions,
    Path(name): Path<String>,
) -> Result<Json<ItemRecord>, ApiError> {
    let user = caller(&extensions)?;
    let item = state.items.get_by_name(user.id, &name)?;
    Ok(Json(item.into()))
}

pub async fn update(
    State(state): State<AppState>,
    extensions: Extensions,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<UpdateItemResponse>, ApiError> {
    let user = caller(&extensions)?;

    let version = state
        .items
        .update(ItemUpdate {
            owner_id: user.id,
            id,
            expected_version: req.expected_version,
            ciphertext: req.ciphertext,
            tags: req.tags,
        })
        .inspect_err(|e| {
            if matches!(e, cipherkeep_core::StoreError::VersionConflict) {
                tracing::warn!(
                    "Stale update of item {} at version {}",
                    id,
                    req.expected_version
                );
            }
        })?;

    tracing::info!("Item {} now at version {}", id, version);
    Ok(Json(UpdateItemResponse { version }))
}

pub async fn delete(
    State(state): State<AppState>,
    extensions: Extensions,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user = caller(&extensions)?;
    state.items.delete(user.id, id)?;
    tracing::info!("Item {} deleted by {}", id, user.id);
    Ok(StatusCode::NO_CONTENT)
}
