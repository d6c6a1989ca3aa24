//! Wire format shared by the server and its clients.

use crate::models::{base64_bytes, Item, ItemKind, Watermark};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// An item as transported over HTTP. The owner is implied by the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: Uuid,
    pub kind: ItemKind,
    pub name: String,
    /// Envelope blob: `salt(32) || nonce(12) || ciphertext || tag(16)`.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub tombstoned: bool,
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            kind: item.kind,
            name: item.name,
            ciphertext: item.ciphertext,
            tags: item.tags,
            created_at: item.created_at,
            updated_at: item.updated_at,
            version: item.version,
            tombstoned: item.tombstoned,
        }
    }
}

/// Request body for account registration and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

/// Issued identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub token: String,
}

/// Request body for creating an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub kind: ItemKind,
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Request body for replacing an item's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub expected_version: i64,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Version assigned by a successful update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateItemResponse {
    pub version: i64,
}

/// Request body for pulling changes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub since: Watermark,
}

/// One batch of changes plus the watermark to send next time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub items: Vec<ItemRecord>,
    pub watermark: Watermark,
    #[serde(default)]
    pub has_more: bool,
}

/// Error body returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_drops_owner() {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            kind: ItemKind::Credential,
            name: "GitHub".to_string(),
            ciphertext: vec![9; 60],
            tags: HashMap::new(),
            created_at: now,
            updated_at: now,
            version: 2,
            tombstoned: true,
        };

        let json = serde_json::to_value(ItemRecord::from(item.clone())).unwrap();
        assert!(json.get("owner_id").is_none());
        assert_eq!(json["version"], 2);
        assert_eq!(json["tombstoned"], true);
        assert_eq!(json["id"], item.id.to_string());
    }

    #[test]
    fn sync_request_defaults_to_origin() {
        let req: SyncRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.since, Watermark::ORIGIN);

        let req: SyncRequest = serde_json::from_str(r#"{"since": 42}"#).unwrap();
        assert_eq!(req.since.as_micros(), 42);
    }

    #[test]
    fn update_request_decodes_base64() {
        let req: UpdateItemRequest =
            serde_json::from_str(r#"{"expected_version": 3, "ciphertext": "AQID"}"#).unwrap();
        assert_eq!(req.ciphertext, vec![1, 2, 3]);
        assert!(req.tags.is_empty());
    }
}
