//! HTTP client for the CipherKeep server.

use crate::models::{ItemKind, Watermark};
use crate::sync::models::{
    AuthRequest, AuthResponse, CreateItemRequest, ErrorBody, ItemRecord, SyncRequest,
    SyncResponse, UpdateItemRequest, UpdateItemResponse,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// The server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect() || e.is_timeout())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Thin typed wrapper over the REST API.
pub struct KeeperClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl KeeperClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a previously issued token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Create an account and keep the returned token.
    pub async fn register(&mut self, username: &str, password: &str) -> ClientResult<AuthResponse> {
        self.authenticate("/api/v1/auth/register", username, password)
            .await
    }

    /// Log in and keep the returned token.
    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<AuthResponse> {
        self.authenticate("/api/v1/auth/login", username, password)
            .await
    }

    pub async fn create_item(
        &self,
        kind: ItemKind,
        name: &str,
        ciphertext: Vec<u8>,
        tags: HashMap<String, String>,
    ) -> ClientResult<ItemRecord> {
        let body = CreateItemRequest {
            kind,
            name: name.to_string(),
            ciphertext,
            tags,
        };
        let req = self.authed(self.client.post(self.url("/api/v1/items")))?;
        decode(req.json(&body).send().await?).await
    }

    pub async fn get_item(&self, id: Uuid) -> ClientResult<ItemRecord> {
        let req = self.authed(self.client.get(self.url(&format!("/api/v1/items/{}", id))))?;
        decode(req.send().await?).await
    }

    pub async fn get_item_by_name(&self, name: &str) -> ClientResult<ItemRecord> {
        let mut url = reqwest::Url::parse(&self.url("/api/v1/items/by-name/"))
            .map_err(|e| ClientError::Server {
                status: 0,
                message: format!("Invalid server URL: {}", e),
            })?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        let req = self.authed(self.client.get(url))?;
        decode(req.send().await?).await
    }

    pub async fn list_items(&self, kind: Option<ItemKind>) -> ClientResult<Vec<ItemRecord>> {
        let mut req = self.authed(self.client.get(self.url("/api/v1/items")))?;
        if let Some(kind) = kind {
            req = req.query(&[("kind", kind.as_str())]);
        }
        decode(req.send().await?).await
    }

    /// Replace content, presenting the version last observed. Returns the new version.
    pub async fn update_item(
        &self,
        id: Uuid,
        expected_version: i64,
        ciphertext: Vec<u8>,
        tags: HashMap<String, String>,
    ) -> ClientResult<i64> {
        let body = UpdateItemRequest {
            expected_version,
            ciphertext,
            tags,
        };
        let req = self.authed(self.client.put(self.url(&format!("/api/v1/items/{}", id))))?;
        let resp: UpdateItemResponse = decode(req.json(&body).send().await?).await?;
        Ok(resp.version)
    }

    pub async fn delete_item(&self, id: Uuid) -> ClientResult<()> {
        let req = self.authed(
            self.client
                .delete(self.url(&format!("/api/v1/items/{}", id))),
        )?;
        check(req.send().await?).await?;
        Ok(())
    }

    /// Pull one batch of changes after `since`.
    pub async fn sync(&self, since: Watermark) -> ClientResult<SyncResponse> {
        let req = self.authed(self.client.post(self.url("/api/v1/sync")))?;
        decode(req.json(&SyncRequest { since }).send().await?).await
    }

    // --- Internal helpers ---

    async fn authenticate(
        &mut self,
        path: &str,
        username: &str,
        password: &str,
    ) -> ClientResult<AuthResponse> {
        let body = AuthRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self.client.post(self.url(path)).json(&body).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::InvalidCredentials);
        }
        let auth: AuthResponse = decode(resp).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> ClientResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(req.bearer_auth(token))
    }
}

async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
    };

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::NotAuthenticated,
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::CONFLICT => ClientError::Conflict(message),
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> ClientResult<T> {
    Ok(check(resp).await?.json().await?)
}
