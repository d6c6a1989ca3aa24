use crate::config::ServerConfig;
use crate::server::{build_router, AppState};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cipherkeep_core::{ItemKind, MemoryStore, SecretPayload};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(config: ServerConfig) -> Router {
    let state = AppState::new(Arc::new(MemoryStore::new()), &config);
    build_router(state, &config)
}

fn app() -> Router {
    app_with(ServerConfig {
        token_secret: "test-secret".to_string(),
        ..ServerConfig::default()
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

async fn create(app: &Router, token: &str, kind: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/items",
        Some(token),
        Some(json!({ "kind": kind, "name": name, "ciphertext": "AQID", "tags": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = send(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));
}

#[tokio::test]
async fn register_and_login() {
    let app = app();
    register(&app, "alice", "hunter2").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({ "username": "alice", "password": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let wrong_password = body["error"].clone();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": "hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], wrong_password);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
    assert!(body["user_id"].as_str().is_some());
}

#[tokio::test]
async fn empty_credentials_rejected() {
    let app = app();
    for body in [
        json!({ "username": "", "password": "x" }),
        json!({ "username": "bob", "password": "" }),
    ] {
        let (status, _) = send(&app, Method::POST, "/api/v1/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn data_routes_require_token() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/v1/items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/v1/items", Some("not.a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/sync",
        None,
        Some(json!({ "since": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn item_lifecycle() {
    let app = app();
    let token = register(&app, "alice", "pw").await;

    let created = create(&app, &token, "credential", "GitHub").await;
    assert_eq!(created["version"], 1);
    assert_eq!(created["ciphertext"], "AQID");
    assert!(created.get("owner_id").is_none());
    let id = created["id"].as_str().unwrap().to_string();
    create(&app, &token, "text", "notes").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({ "kind": "text", "name": "GitHub", "ciphertext": "AQID" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/items/{}", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "GitHub");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/items/by-name/GitHub",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/v1/items?kind=credential",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = send(&app, Method::GET, "/api/v1/items", Some(&token), None).await;
    assert_eq!(body[0]["name"], "notes");
    assert_eq!(body[1]["name"], "GitHub");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/items/{}", id),
        Some(&token),
        Some(json!({ "expected_version": 1, "ciphertext": "BAUG", "tags": { "url": "github.com" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/items/{}", id),
        Some(&token),
        Some(json!({ "expected_version": 1, "ciphertext": "BwgJ" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/items/{}", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/items/{}", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/sync",
        Some(&token),
        Some(json!({ "since": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["id"], id.as_str());
    assert_eq!(items[1]["tombstoned"], true);
    assert_eq!(items[1]["version"], 2);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn items_are_private_to_owner() {
    let app = app();
    let alice = register(&app, "alice", "pw").await;
    let bob = register(&app, "bob", "pw").await;

    let created = create(&app, &alice, "card", "Visa").await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/items/{}", id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/items/{}", id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/v1/sync",
        Some(&bob),
        Some(json!({ "since": 0 })),
    )
    .await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_input_is_bad_request() {
    let app = app();
    let token = register(&app, "alice", "pw").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({ "kind": "text", "name": "   ", "ciphertext": "AQID" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({ "kind": "text", "name": "empty", "ciphertext": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/items?kind=ssh_key",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_pages_through_large_change_sets() {
    let app = app_with(ServerConfig {
        token_secret: "test-secret".to_string(),
        max_sync_batch: 2,
        ..ServerConfig::default()
    });
    let token = register(&app, "alice", "pw").await;
    for name in ["a", "b", "c"] {
        create(&app, &token, "text", name).await;
    }

    let (_, first) = send(
        &app,
        Method::POST,
        "/api/v1/sync",
        Some(&token),
        Some(json!({ "since": 0 })),
    )
    .await;
    assert_eq!(first["items"].as_array().unwrap().len(), 2);
    assert_eq!(first["has_more"], true);

    let (_, second) = send(
        &app,
        Method::POST,
        "/api/v1/sync",
        Some(&token),
        Some(json!({ "since": first["watermark"] })),
    )
    .await;
    let items = second["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "c");
    assert_eq!(second["has_more"], false);
}

#[tokio::test]
async fn sealed_payload_survives_the_round_trip() {
    let app = app();
    let token = register(&app, "alice", "master-pw").await;

    let payload = SecretPayload::Credential {
        login: "octocat".to_string(),
        password: "s3cret".to_string(),
    };
    let sealed = STANDARD.encode(payload.seal(b"master-pw").unwrap());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({ "kind": "credential", "name": "GitHub", "ciphertext": sealed })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::POST, "/api/v1/sync", Some(&token), Some(json!({}))).await;
    let blob = STANDARD
        .decode(body["items"][0]["ciphertext"].as_str().unwrap())
        .unwrap();
    let opened = SecretPayload::open(ItemKind::Credential, &blob, b"master-pw").unwrap();
    assert_eq!(opened, payload);
}

#[tokio::test]
async fn large_binary_items_fit_under_payload_limit() {
    let app = app();
    let token = register(&app, "alice", "pw").await;

    // Well past axum's 2 MB default, under the configured 8 MiB
    let ciphertext = STANDARD.encode(vec![0x5a; 3 * 1024 * 1024]);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({ "kind": "binary", "name": "disk image", "ciphertext": ciphertext })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["version"], 1);
}

#[tokio::test]
async fn oversized_body_is_rejected_as_json() {
    let app = app_with(ServerConfig {
        token_secret: "test-secret".to_string(),
        max_payload_size: 1024,
        ..ServerConfig::default()
    });
    let token = register(&app, "alice", "pw").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({ "kind": "text", "name": "big", "ciphertext": "A".repeat(4096) })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn extractor_rejections_use_error_body() {
    let app = app();
    let token = register(&app, "alice", "pw").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/items")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({ "kind": "ssh_key", "name": "x", "ciphertext": "AQID" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/items/not-a-uuid",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
