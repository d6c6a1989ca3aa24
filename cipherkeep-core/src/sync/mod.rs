//! Incremental pull sync.
//!
//! A client keeps one [`Watermark`] and asks for everything that changed
//! after it. The coordinator captures the store's current instant *before*
//! running the query and hands that back as the next watermark, so a
//! mutation racing with the query is delivered again on the next pull
//! rather than skipped. Conflicts are resolved last-write-wins at item
//! granularity by the optimistic version check in the repository; nothing
//! here merges.

pub mod models;

pub use models::{ItemRecord, SyncRequest, SyncResponse};

use crate::models::{Item, Watermark};
use crate::store::{ItemRepository, StoreResult};
use std::sync::Arc;
use uuid::Uuid;

/// Result of one sync call.
#[derive(Debug, Clone)]
pub struct SyncBatch {
    /// Changed items, tombstones included, oldest change first.
    pub items: Vec<Item>,
    /// Watermark to present on the next call.
    pub watermark: Watermark,
    /// More changes are waiting beyond `watermark`.
    pub has_more: bool,
}

impl From<SyncBatch> for SyncResponse {
    fn from(batch: SyncBatch) -> Self {
        Self {
            items: batch.items.into_iter().map(ItemRecord::from).collect(),
            watermark: batch.watermark,
            has_more: batch.has_more,
        }
    }
}

/// Turns a client watermark into the next batch of changes.
#[derive(Clone)]
pub struct SyncCoordinator {
    repo: Arc<dyn ItemRepository>,
    max_batch: Option<usize>,
}

impl SyncCoordinator {
    pub fn new(repo: Arc<dyn ItemRepository>) -> Self {
        Self {
            repo,
            max_batch: None,
        }
    }

    /// Cap the number of items per batch. Zero means unlimited.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = (max_batch > 0).then_some(max_batch);
        self
    }

    pub fn sync(&self, owner_id: Uuid, since: Watermark) -> StoreResult<SyncBatch> {
        let captured = self.repo.current_instant()?;
        // One extra row tells whether anything lies beyond the batch
        let fetch = self.max_batch.map(|limit| limit.saturating_add(1));
        let mut items = self.repo.list_changed_since(owner_id, since, fetch)?;

        match self.max_batch {
            Some(limit) if items.len() > limit => {
                items.truncate(limit);
                // Resume right after the last delivered change. Stamps are
                // unique per store, so nothing sharing it can be skipped.
                let watermark = items
                    .last()
                    .map(|i| Watermark::from_datetime(i.updated_at))
                    .unwrap_or(since);
                tracing::debug!(
                    "Sync for {} truncated at {} items",
                    owner_id,
                    items.len()
                );
                Ok(SyncBatch {
                    items,
                    watermark,
                    has_more: true,
                })
            }
            _ => {
                tracing::debug!("Sync for {} returned {} items", owner_id, items.len());
                Ok(SyncBatch {
                    items,
                    watermark: captured,
                    has_more: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKind, NewItem};
    use crate::store::{IdentityDirectory, MemoryStore};
    use std::collections::HashMap;

    fn seeded(count: usize) -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let owner = store.register("alice", "hash").unwrap().id;
        for n in 0..count {
            store
                .create(NewItem {
                    owner_id: owner,
                    kind: ItemKind::Text,
                    name: format!("note-{}", n),
                    ciphertext: vec![n as u8 + 1],
                    tags: HashMap::new(),
                })
                .unwrap();
        }
        (store, owner)
    }

    #[test]
    fn watermark_is_captured_before_query() {
        let (store, owner) = seeded(2);
        let before = store.current_instant().unwrap();
        let coordinator = SyncCoordinator::new(store.clone());

        let batch = coordinator.sync(owner, Watermark::ORIGIN).unwrap();
        assert_eq!(batch.items.len(), 2);
        assert!(!batch.has_more);
        assert!(batch.watermark > before);
        assert!(batch
            .items
            .iter()
            .all(|i| Watermark::from_datetime(i.updated_at) < batch.watermark));

        let again = coordinator.sync(owner, batch.watermark).unwrap();
        assert!(again.items.is_empty());
    }

    #[test]
    fn bounded_batches_resume_without_gaps() {
        let (store, owner) = seeded(5);
        let coordinator = SyncCoordinator::new(store).with_max_batch(2);

        let mut seen = Vec::new();
        let mut since = Watermark::ORIGIN;
        let mut rounds = 0;
        loop {
            let batch = coordinator.sync(owner, since).unwrap();
            seen.extend(batch.items.iter().map(|i| i.name.clone()));
            since = batch.watermark;
            rounds += 1;
            if !batch.has_more {
                break;
            }
        }

        assert_eq!(rounds, 3);
        let expected: Vec<String> = (0..5).map(|n| format!("note-{}", n)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn zero_batch_means_unlimited() {
        let (store, owner) = seeded(3);
        let batch = SyncCoordinator::new(store)
            .with_max_batch(0)
            .sync(owner, Watermark::ORIGIN)
            .unwrap();
        assert_eq!(batch.items.len(), 3);
        assert!(!batch.has_more);
    }
}
