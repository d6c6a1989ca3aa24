//! In-memory backend with the same semantics as the SQLite one.

use crate::models::{Item, ItemKind, ItemUpdate, NewItem, User, Watermark};
use crate::store::{
    validate_ciphertext, validate_credential_hash, validate_name, IdentityDirectory,
    ItemRepository, MonotonicClock, StoreError, StoreResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    items: HashMap<Uuid, Item>,
}

impl Tables {
    fn live_name_taken(&self, owner_id: Uuid, name: &str) -> bool {
        self.items
            .values()
            .any(|i| i.owner_id == owner_id && !i.tombstoned && i.name == name)
    }

    fn owned(&self, owner_id: Uuid, id: Uuid) -> Option<&Item> {
        self.items.get(&id).filter(|i| i.owner_id == owner_id)
    }
}

/// Mutex-guarded maps. Every operation runs under one lock, so check-and-set
/// is trivially atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    clock: Arc<MonotonicClock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Lock error: {}", e)))
    }
}

impl ItemRepository for MemoryStore {
    fn create(&self, item: NewItem) -> StoreResult<Item> {
        validate_name(&item.name)?;
        validate_ciphertext(&item.ciphertext)?;

        let mut tables = self.tables()?;
        if !tables.users.contains_key(&item.owner_id) {
            return Err(StoreError::Validation("unknown owner".to_string()));
        }
        if tables.live_name_taken(item.owner_id, &item.name) {
            return Err(StoreError::NameConflict);
        }

        let now = self.clock.tick();
        let created = Item {
            id: Uuid::new_v4(),
            owner_id: item.owner_id,
            kind: item.kind,
            name: item.name,
            ciphertext: item.ciphertext,
            tags: item.tags,
            created_at: now,
            updated_at: now,
            version: 1,
            tombstoned: false,
        };
        tables.items.insert(created.id, created.clone());
        Ok(created)
    }

    fn get_by_id(&self, owner_id: Uuid, id: Uuid) -> StoreResult<Item> {
        let tables = self.tables()?;
        tables
            .owned(owner_id, id)
            .filter(|i| !i.tombstoned)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn get_by_name(&self, owner_id: Uuid, name: &str) -> StoreResult<Item> {
        let tables = self.tables()?;
        tables
            .items
            .values()
            .find(|i| i.owner_id == owner_id && !i.tombstoned && i.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn list(&self, owner_id: Uuid, kind: Option<ItemKind>) -> StoreResult<Vec<Item>> {
        let tables = self.tables()?;
        let mut items: Vec<Item> = tables
            .items
            .values()
            .filter(|i| i.owner_id == owner_id && !i.tombstoned)
            .filter(|i| kind.map_or(true, |k| i.kind == k))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    fn update(&self, update: ItemUpdate) -> StoreResult<i64> {
        validate_ciphertext(&update.ciphertext)?;

        let mut tables = self.tables()?;
        let item = tables
            .items
            .get_mut(&update.id)
            .filter(|i| i.owner_id == update.owner_id)
            .ok_or(StoreError::NotFound)?;

        if item.tombstoned || item.version != update.expected_version {
            return Err(StoreError::VersionConflict);
        }

        item.ciphertext = update.ciphertext;
        item.tags = update.tags;
        item.updated_at = self.clock.tick();
        item.version += 1;
        Ok(item.version)
    }

    fn delete(&self, owner_id: Uuid, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let item = tables
            .items
            .get_mut(&id)
            .filter(|i| i.owner_id == owner_id)
            .ok_or(StoreError::NotFound)?;

        if !item.tombstoned {
            item.tombstoned = true;
            item.updated_at = self.clock.tick();
        }
        Ok(())
    }

    fn list_changed_since(
        &self,
        owner_id: Uuid,
        since: Watermark,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>> {
        let tables = self.tables()?;
        let mut changed: Vec<&Item> = tables
            .items
            .values()
            .filter(|i| i.owner_id == owner_id && since.precedes(&i.updated_at))
            .collect();
        changed.sort_by_key(|i| i.updated_at);
        Ok(changed
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn current_instant(&self) -> StoreResult<Watermark> {
        Ok(Watermark::from_micros(self.clock.tick_micros()))
    }
}

impl IdentityDirectory for MemoryStore {
    fn register(&self, name: &str, credential_hash: &str) -> StoreResult<User> {
        validate_name(name)?;
        validate_credential_hash(credential_hash)?;

        let mut tables = self.tables()?;
        if tables.users.values().any(|u| u.name == name) {
            return Err(StoreError::AlreadyExists);
        }

        let now = self.clock.tick();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            credential_hash: credential_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_by_name(&self, name: &str) -> StoreResult<User> {
        let tables = self.tables()?;
        tables
            .users
            .values()
            .find(|u| u.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn find_by_id(&self, id: Uuid) -> StoreResult<User> {
        let tables = self.tables()?;
        tables.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }
}
