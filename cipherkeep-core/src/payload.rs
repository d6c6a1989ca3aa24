//! Plaintext payloads and their sealing into envelope blobs.
//!
//! This layer sits above the item store: it knows the shape of each kind of
//! secret, serializes it to JSON and seals it with the envelope cipher. The
//! store only ever sees the resulting blob plus the [`ItemKind`] tag.

use crate::crypto::{self, CryptoError};
use crate::models::{base64_bytes, ItemKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors raised while sealing or opening a payload.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Payload encoding failed: {0}")]
    Encoding(String),

    #[error("Payload kind mismatch: item is {expected}, payload is {found}")]
    KindMismatch { expected: ItemKind, found: ItemKind },
}

/// Decrypted content of an item, one variant per [`ItemKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretPayload {
    Credential {
        login: String,
        password: String,
    },
    Text {
        content: String,
    },
    Binary {
        filename: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    Card {
        number: String,
        holder: String,
        cvv: String,
        expiry_month: String,
        expiry_year: String,
    },
}

impl SecretPayload {
    /// The item kind this payload is stored under.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Credential { .. } => ItemKind::Credential,
            Self::Text { .. } => ItemKind::Text,
            Self::Binary { .. } => ItemKind::Binary,
            Self::Card { .. } => ItemKind::Card,
        }
    }

    /// Serialize and encrypt under `secret`, producing an opaque envelope blob.
    pub fn seal(&self, secret: &[u8]) -> Result<Vec<u8>, PayloadError> {
        let mut json =
            serde_json::to_vec(self).map_err(|e| PayloadError::Encoding(e.to_string()))?;
        let sealed = crypto::encrypt_with_secret(&json, secret);
        json.zeroize();
        Ok(sealed?)
    }

    /// Decrypt an envelope blob and check it holds a payload of `kind`.
    pub fn open(kind: ItemKind, blob: &[u8], secret: &[u8]) -> Result<Self, PayloadError> {
        let mut json = crypto::decrypt_with_secret(blob, secret)?;
        let parsed: Result<Self, _> = serde_json::from_slice(&json);
        json.zeroize();

        let payload = parsed.map_err(|e| PayloadError::Encoding(e.to_string()))?;
        if payload.kind() != kind {
            return Err(PayloadError::KindMismatch {
                expected: kind,
                found: payload.kind(),
            });
        }
        Ok(payload)
    }
}
