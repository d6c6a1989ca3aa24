//! CipherKeep core library
//!
//! End-to-end encrypted secret storage: the envelope cipher clients use to
//! seal payloads, the versioned item repository with optimistic concurrency,
//! the identity directory, and the watermark-based sync coordinator.

#[cfg(feature = "client")]
pub mod client;
pub mod crypto;
pub mod models;
pub mod payload;
pub mod platform;
pub mod store;
pub mod sync;

pub use crypto::{
    decrypt_with_secret, encrypt_with_secret, hash_credential, verify_credential, CryptoError,
};
pub use models::{Item, ItemKind, ItemUpdate, NewItem, User, Watermark};
pub use payload::{PayloadError, SecretPayload};
pub use store::{
    IdentityDirectory, ItemRepository, KeeperStore, MemoryStore, SqliteStore, StoreError,
    StoreResult,
};
pub use sync::{SyncBatch, SyncCoordinator};

use thiserror::Error;

/// Result type for CipherKeep operations
pub type Result<T> = std::result::Result<T, KeeperError>;

/// General error type for CipherKeep operations
#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[cfg(feature = "client")]
    #[error("Client error: {0}")]
    Client(#[from] client::ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
