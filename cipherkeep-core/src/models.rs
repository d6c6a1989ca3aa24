//! Data model: users, items, item kinds and sync watermarks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Argon2 PHC string. Never leaves the identity directory in serialized form.
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of secret an item holds.
///
/// The repository only stores the tag; the matching payload shape lives in
/// [`crate::payload::SecretPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Credential,
    Text,
    Binary,
    Card,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [Self::Credential, Self::Text, Self::Binary, Self::Card];

    /// Convert the kind to its storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Card => "card",
        }
    }

    /// Parse a kind from its storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credential" => Some(Self::Credential),
            "text" => Some(Self::Text),
            "binary" => Some(Self::Binary),
            "card" => Some(Self::Card),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored secret record.
///
/// `ciphertext` is an envelope blob the store never inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: ItemKind,
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub tombstoned: bool,
}

/// Input to [`crate::store::ItemRepository::create`].
#[derive(Debug, Clone)]
pub struct NewItem {
    pub owner_id: Uuid,
    pub kind: ItemKind,
    pub name: String,
    pub ciphertext: Vec<u8>,
    pub tags: HashMap<String, String>,
}

/// Input to [`crate::store::ItemRepository::update`]: new content plus the
/// version the caller last observed.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub owner_id: Uuid,
    pub id: Uuid,
    pub expected_version: i64,
    pub ciphertext: Vec<u8>,
    pub tags: HashMap<String, String>,
}

/// Opaque "last synchronized instant", in microseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Watermark(i64);

impl Watermark {
    /// Watermark of a client that has never synced.
    pub const ORIGIN: Watermark = Watermark(0);

    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(instant.timestamp_micros())
    }

    /// Whether `instant` lies strictly after this watermark.
    pub fn precedes(&self, instant: &DateTime<Utc>) -> bool {
        instant.timestamp_micros() > self.0
    }
}

/// Base64 serialization for `Vec<u8>`.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
