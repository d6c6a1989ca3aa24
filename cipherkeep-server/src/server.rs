//! Axum router setup.

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::error::json_error_body;
use crate::handlers::{accounts, items, sync};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use cipherkeep_core::{IdentityDirectory, ItemRepository, KeeperStore, SyncCoordinator};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state. Built once in `main` around a single store handle.
#[derive(Clone)]
pub struct AppState {
    pub items: Arc<dyn ItemRepository>,
    pub users: Arc<dyn IdentityDirectory>,
    pub sync: SyncCoordinator,
    pub token_secret: Arc<[u8]>,
    pub token_ttl: chrono::Duration,
}

impl AppState {
    pub fn new<S: KeeperStore + 'static>(store: Arc<S>, config: &ServerConfig) -> Self {
        let items: Arc<dyn ItemRepository> = store.clone();
        Self {
            sync: SyncCoordinator::new(items.clone()).with_max_batch(config.max_sync_batch),
            items,
            users: store,
            token_secret: Arc::from(config.token_secret.as_bytes()),
            token_ttl: chrono::Duration::seconds(config.token_ttl_secs),
        }
    }
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    // Authenticated routes
    let authenticated = Router::new()
        .route("/api/v1/items", post(items::create).get(items::list))
        .route("/api/v1/items/by-name/{name}", get(items::get_by_name))
        .route(
            "/api/v1/items/{id}",
            get(items::get).put(items::update).delete(items::delete),
        )
        .route("/api/v1/sync", post(sync::sync))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Unauthenticated routes
    let public = Router::new()
        .route("/api/v1/auth/register", post(accounts::register))
        .route("/api/v1/auth/login", post(accounts::login))
        .route("/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_payload_size))
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
        .layer(middleware::map_response(json_error_body))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
