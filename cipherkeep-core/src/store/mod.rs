//! Storage layer: the item repository and identity directory contracts,
//! with a SQLite backend for production and an in-memory backend for tests.

mod clock;
pub mod memory;
pub mod sqlite;

pub use clock::MonotonicClock;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::models::{Item, ItemKind, ItemUpdate, NewItem, User, Watermark};
use thiserror::Error;
use uuid::Uuid;

/// Longest accepted item or user name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Storage errors, grouped the way callers need to react to them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Rejected before touching the store.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("An item with this name already exists")]
    NameConflict,

    #[error("Version conflict - item was modified by another client")]
    VersionConflict,

    #[error("User already exists")]
    AlreadyExists,

    /// Absent, tombstoned, or owned by someone else. Callers cannot tell which.
    #[error("Not found")]
    NotFound,

    /// Transient failure; the caller may retry.
    #[error("Storage temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable, per-owner store of versioned, soft-deletable items.
pub trait ItemRepository: Send + Sync {
    /// Insert a new item at version 1. Fails with `NameConflict` when the owner
    /// already has a live item with the same name.
    fn create(&self, item: NewItem) -> StoreResult<Item>;

    /// Fetch a live item by id.
    fn get_by_id(&self, owner_id: Uuid, id: Uuid) -> StoreResult<Item>;

    /// Fetch a live item by name.
    fn get_by_name(&self, owner_id: Uuid, name: &str) -> StoreResult<Item>;

    /// All live items of the owner, newest first, optionally of one kind.
    fn list(&self, owner_id: Uuid, kind: Option<ItemKind>) -> StoreResult<Vec<Item>>;

    /// Atomically replace content if the stored version still equals
    /// `expected_version`. Returns the new version.
    fn update(&self, update: ItemUpdate) -> StoreResult<i64>;

    /// Tombstone an item. Deleting an already tombstoned item succeeds.
    fn delete(&self, owner_id: Uuid, id: Uuid) -> StoreResult<()>;

    /// Every item, tombstoned or not, updated strictly after `since`,
    /// oldest change first. `limit` caps the result at the oldest changes.
    fn list_changed_since(
        &self,
        owner_id: Uuid,
        since: Watermark,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>>;

    /// The store's current instant, from the same clock that stamps mutations.
    fn current_instant(&self) -> StoreResult<Watermark>;
}

/// User accounts.
pub trait IdentityDirectory: Send + Sync {
    fn register(&self, name: &str, credential_hash: &str) -> StoreResult<User>;

    fn find_by_name(&self, name: &str) -> StoreResult<User>;

    fn find_by_id(&self, id: Uuid) -> StoreResult<User>;
}

/// A backend serving both items and accounts.
pub trait KeeperStore: ItemRepository + IdentityDirectory {}

impl<T: ItemRepository + IdentityDirectory> KeeperStore for T {}

/// Check a user or item name before it reaches a backend.
pub fn validate_name(name: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("name is required".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::Validation(format!(
            "name longer than {} bytes",
            MAX_NAME_LEN
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(StoreError::Validation(
            "name contains control characters".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_ciphertext(ciphertext: &[u8]) -> StoreResult<()> {
    if ciphertext.is_empty() {
        return Err(StoreError::Validation("ciphertext is required".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_credential_hash(hash: &str) -> StoreResult<()> {
    if hash.is_empty() {
        return Err(StoreError::Validation(
            "credential hash is required".to_string(),
        ));
    }
    Ok(())
}
