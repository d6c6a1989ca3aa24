//! SQLite backend for users and items.

use crate::models::{Item, ItemKind, ItemUpdate, NewItem, User, Watermark};
use crate::store::clock::{from_micros, MonotonicClock};
use crate::store::{
    validate_ciphertext, validate_credential_hash, validate_name, IdentityDirectory,
    ItemRepository, StoreError, StoreResult,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

const ITEM_COLUMNS: &str = "id, owner_id, kind, name, ciphertext, tags, created_at, updated_at, version, tombstoned";

/// Thread-safe SQLite store. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<MonotonicClock>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and `--database :memory:`.
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.busy_timeout(Duration::from_secs(5))?;
        initialize_schema(&conn)?;

        let latest: i64 = conn.query_row(
            "SELECT MAX(
                (SELECT COALESCE(MAX(updated_at), 0) FROM items),
                (SELECT COALESCE(MAX(updated_at), 0) FROM users)
             )",
            [],
            |row| row.get(0),
        )?;
        tracing::debug!("Opened item store, latest stamp {}", latest);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(MonotonicClock::starting_after(latest)),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Lock error: {}", e)))
    }
}

fn initialize_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            ciphertext BLOB NOT NULL,
            tags TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            tombstoned INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (owner_id) REFERENCES users(id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_items_owner_live_name
            ON items(owner_id, name) WHERE tombstoned = 0;
        CREATE INDEX IF NOT EXISTS idx_items_owner_updated
            ON items(owner_id, updated_at);
        CREATE INDEX IF NOT EXISTS idx_items_owner_created
            ON items(owner_id, created_at);",
    )?;
    Ok(())
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                StoreError::Unavailable(e.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

fn constraint_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            Some(err.extended_code)
        }
        _ => None,
    }
}

fn conversion_error<E>(index: usize, ty: Type, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, ty, Box::new(e))
}

fn parse_uuid(row: &Row<'_>, index: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(index)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(index, Type::Text, e))
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let kind_raw: String = row.get(2)?;
    let kind = ItemKind::parse(&kind_raw).ok_or_else(|| {
        conversion_error(
            2,
            Type::Text,
            StoreError::Backend(format!("unknown item kind '{}'", kind_raw)),
        )
    })?;
    let tags_raw: String = row.get(5)?;
    let tags: HashMap<String, String> =
        serde_json::from_str(&tags_raw).map_err(|e| conversion_error(5, Type::Text, e))?;

    Ok(Item {
        id: parse_uuid(row, 0)?,
        owner_id: parse_uuid(row, 1)?,
        kind,
        name: row.get(3)?,
        ciphertext: row.get(4)?,
        tags,
        created_at: from_micros(row.get(6)?),
        updated_at: from_micros(row.get(7)?),
        version: row.get(8)?,
        tombstoned: row.get(9)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row, 0)?,
        name: row.get(1)?,
        credential_hash: row.get(2)?,
        created_at: from_micros(row.get(3)?),
        updated_at: from_micros(row.get(4)?),
    })
}

fn encode_tags(tags: &HashMap<String, String>) -> StoreResult<String> {
    serde_json::to_string(tags).map_err(|e| StoreError::Backend(e.to_string()))
}

fn collect_items(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StoreResult<Vec<Item>> {
    let mut stmt = conn.prepare(sql)?;
    let items = stmt
        .query_map(params, item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

impl ItemRepository for SqliteStore {
    fn create(&self, item: NewItem) -> StoreResult<Item> {
        validate_name(&item.name)?;
        validate_ciphertext(&item.ciphertext)?;
        let tags = encode_tags(&item.tags)?;

        let conn = self.conn()?;
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

        let inserted = conn.execute(
            "INSERT INTO items (id, owner_id, kind, name, ciphertext, tags,
                                created_at, updated_at, version, tombstoned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 1, 0)",
            params![
                created.id.to_string(),
                created.owner_id.to_string(),
                created.kind.as_str(),
                created.name,
                created.ciphertext,
                tags,
                now.timestamp_micros(),
            ],
        );

        match inserted {
            Ok(_) => {
                tracing::debug!("Created item {} ({})", created.id, created.kind);
                Ok(created)
            }
            Err(e) => match constraint_code(&e) {
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => Err(StoreError::NameConflict),
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    Err(StoreError::Validation("unknown owner".to_string()))
                }
                _ => Err(e.into()),
            },
        }
    }

    fn get_by_id(&self, owner_id: Uuid, id: Uuid) -> StoreResult<Item> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM items WHERE id = ?1 AND owner_id = ?2 AND tombstoned = 0",
                ITEM_COLUMNS
            ),
            params![id.to_string(), owner_id.to_string()],
            item_from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
    }

    fn get_by_name(&self, owner_id: Uuid, name: &str) -> StoreResult<Item> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM items WHERE owner_id = ?1 AND name = ?2 AND tombstoned = 0",
                ITEM_COLUMNS
            ),
            params![owner_id.to_string(), name],
            item_from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
    }

    fn list(&self, owner_id: Uuid, kind: Option<ItemKind>) -> StoreResult<Vec<Item>> {
        let conn = self.conn()?;
        match kind {
            Some(kind) => collect_items(
                &conn,
                &format!(
                    "SELECT {} FROM items
                     WHERE owner_id = ?1 AND kind = ?2 AND tombstoned = 0
                     ORDER BY created_at DESC",
                    ITEM_COLUMNS
                ),
                params![owner_id.to_string(), kind.as_str()],
            ),
            None => collect_items(
                &conn,
                &format!(
                    "SELECT {} FROM items
                     WHERE owner_id = ?1 AND tombstoned = 0
                     ORDER BY created_at DESC",
                    ITEM_COLUMNS
                ),
                params![owner_id.to_string()],
            ),
        }
    }

    fn update(&self, update: ItemUpdate) -> StoreResult<i64> {
        validate_ciphertext(&update.ciphertext)?;
        let tags = encode_tags(&update.tags)?;

        let conn = self.conn()?;
        let now = self.clock.tick_micros();

        // Check-and-set in one statement: the version guard is the WHERE clause.
        let changed = conn.execute(
            "UPDATE items
             SET ciphertext = ?1, tags = ?2, updated_at = ?3, version = version + 1
             WHERE id = ?4 AND owner_id = ?5 AND version = ?6 AND tombstoned = 0",
            params![
                update.ciphertext,
                tags,
                now,
                update.id.to_string(),
                update.owner_id.to_string(),
                update.expected_version,
            ],
        )?;

        if changed == 1 {
            tracing::debug!(
                "Updated item {} to version {}",
                update.id,
                update.expected_version + 1
            );
            return Ok(update.expected_version + 1);
        }

        let exists: Option<bool> = conn
            .query_row(
                "SELECT tombstoned FROM items WHERE id = ?1 AND owner_id = ?2",
                params![update.id.to_string(), update.owner_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match exists {
            Some(_) => {
                tracing::warn!("Version conflict on item {}", update.id);
                Err(StoreError::VersionConflict)
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn delete(&self, owner_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.conn()?;
        let now = self.clock.tick_micros();

        let changed = conn.execute(
            "UPDATE items SET tombstoned = 1, updated_at = ?1
             WHERE id = ?2 AND owner_id = ?3 AND tombstoned = 0",
            params![now, id.to_string(), owner_id.to_string()],
        )?;
        if changed == 1 {
            tracing::debug!("Tombstoned item {}", id);
            return Ok(());
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1 AND owner_id = ?2)",
            params![id.to_string(), owner_id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn list_changed_since(
        &self,
        owner_id: Uuid,
        since: Watermark,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Item>> {
        // A negative LIMIT means no limit in SQLite
        let limit = limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let conn = self.conn()?;
        collect_items(
            &conn,
            &format!(
                "SELECT {} FROM items
                 WHERE owner_id = ?1 AND updated_at > ?2
                 ORDER BY updated_at ASC
                 LIMIT ?3",
                ITEM_COLUMNS
            ),
            params![owner_id.to_string(), since.as_micros(), limit],
        )
    }

    fn current_instant(&self) -> StoreResult<Watermark> {
        Ok(Watermark::from_micros(self.clock.tick_micros()))
    }
}

impl IdentityDirectory for SqliteStore {
    fn register(&self, name: &str, credential_hash: &str) -> StoreResult<User> {
        validate_name(name)?;
        validate_credential_hash(credential_hash)?;

        let conn = self.conn()?;
        let now = self.clock.tick();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            credential_hash: credential_hash.to_string(),
            created_at: now,
            updated_at: now,
        };

        let inserted = conn.execute(
            "INSERT INTO users (id, name, credential_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                user.id.to_string(),
                user.name,
                user.credential_hash,
                now.timestamp_micros(),
            ],
        );

        match inserted {
            Ok(_) => {
                tracing::info!("Registered user {}", user.id);
                Ok(user)
            }
            Err(e) if constraint_code(&e) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                Err(StoreError::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_name(&self, name: &str) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, credential_hash, created_at, updated_at FROM users WHERE name = ?1",
            [name],
            user_from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
    }

    fn find_by_id(&self, id: Uuid) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, credential_hash, created_at, updated_at FROM users WHERE id = ?1",
            [id.to_string()],
            user_from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(owner_id: Uuid, name: &str) -> NewItem {
        NewItem {
            owner_id,
            kind: ItemKind::Text,
            name: name.to_string(),
            ciphertext: vec![1, 2, 3],
            tags: HashMap::from([("folder".to_string(), "work".to_string())]),
        }
    }

    #[test]
    fn reopen_keeps_items_and_clock_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keeper.db");

        let (owner, first) = {
            let store = SqliteStore::open(&path).unwrap();
            let owner = store.register("alice", "$argon2id$hash").unwrap();
            let first = store.create(new_item(owner.id, "notes")).unwrap();
            (owner, first)
        };

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.get_by_id(owner.id, first.id).unwrap();
        assert_eq!(loaded, first);
        assert_eq!(loaded.tags.get("folder").map(String::as_str), Some("work"));

        let second = store.create(new_item(owner.id, "other")).unwrap();
        assert!(second.updated_at > first.updated_at);
        assert_eq!(store.find_by_name("alice").unwrap().credential_hash, "$argon2id$hash");
    }

    #[test]
    fn unknown_owner_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            store.create(new_item(Uuid::new_v4(), "orphan")),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_user_name() {
        let store = SqliteStore::in_memory().unwrap();
        store.register("bob", "h").unwrap();
        assert_eq!(store.register("bob", "h2").unwrap_err(), StoreError::AlreadyExists);
        // Names are case-sensitive
        assert!(store.register("Bob", "h").is_ok());
    }

    #[test]
    fn busy_maps_to_unavailable() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(StoreError::from(err).is_retryable());
    }
}
