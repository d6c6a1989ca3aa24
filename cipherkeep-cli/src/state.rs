//! Local session and synced item cache.

use cipherkeep_core::sync::models::ItemRecord;
use cipherkeep_core::{ItemKind, KeeperError, Watermark};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Everything the CLI remembers between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientState {
    pub server_url: Option<String>,
    pub user_name: Option<String>,
    pub token: Option<String>,
    /// Last watermark whose batch is already reflected in `items`.
    #[serde(default)]
    pub watermark: Watermark,
    /// Live items as of `watermark`, keyed by id.
    #[serde(default)]
    pub items: BTreeMap<Uuid, ItemRecord>,
}

/// Counts from applying one sync batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub upserted: usize,
    pub removed: usize,
    pub skipped: usize,
}

impl ClientState {
    /// Load state, or start empty if the file does not exist yet.
    pub fn load(path: &Path) -> cipherkeep_core::Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(KeeperError::Io(e)),
        }
    }

    /// Write state atomically: a temp file in the same directory, then rename.
    pub fn save(&self, path: &Path) -> cipherkeep_core::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(self)?;
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Switch to another account, dropping the previous account's cache.
    pub fn start_session(&mut self, server_url: &str, user_name: &str, token: String) {
        let same_account = self.server_url.as_deref() == Some(server_url)
            && self.user_name.as_deref() == Some(user_name);
        if !same_account {
            self.items.clear();
            self.watermark = Watermark::ORIGIN;
        }
        self.server_url = Some(server_url.to_string());
        self.user_name = Some(user_name.to_string());
        self.token = Some(token);
    }

    /// Apply a batch in delivery order. Last write wins per item; a
    /// tombstone removes the cached copy. Redelivered or older versions
    /// are skipped.
    pub fn apply_batch(&mut self, batch: Vec<ItemRecord>) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for record in batch {
            if let Some(cached) = self.items.get(&record.id) {
                if cached.updated_at > record.updated_at {
                    summary.skipped += 1;
                    continue;
                }
            }

            if record.tombstoned {
                if self.items.remove(&record.id).is_some() {
                    summary.removed += 1;
                } else {
                    summary.skipped += 1;
                }
            } else {
                self.items.insert(record.id, record);
                summary.upserted += 1;
            }
        }
        summary
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ItemRecord> {
        self.items.values().find(|item| item.name == name)
    }

    /// Cached items, newest created first, like the server's listing.
    pub fn cached_items(&self, kind: Option<ItemKind>) -> Vec<&ItemRecord> {
        let mut items: Vec<&ItemRecord> = self
            .items
            .values()
            .filter(|item| kind.map_or(true, |k| item.kind == k))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }
}
