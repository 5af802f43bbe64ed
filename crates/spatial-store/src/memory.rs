// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-process document store.
//!
//! [`MemoryDatabase`] is the reference `Database` implementation used by tests
//! and ephemeral graphs. Nothing is persisted across process restarts.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::filter::matches;
use crate::{record_id, Database, Record, StoreResult};

/// One named collection. `order` keeps first-insertion order so `find`
/// results are stable across calls.
#[derive(Default)]
struct Collection {
    records: HashMap<String, Record>,
    order: Vec<String>,
}

/// In-memory document store.
///
/// Records live in per-collection hash maps behind a single `RwLock`.
///
/// # Ordering Invariants
///
/// - `find` yields matches in first-insertion order of their ids.
/// - Replacing a record via `save` keeps its original position.
/// - Deleting and re-saving an id moves it to the end.
#[derive(Default)]
pub struct MemoryDatabase {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDatabase {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.records.len())
    }

    /// Returns `true` if no collection holds any record.
    pub async fn is_empty(&self) -> bool {
        self.collections
            .read()
            .await
            .values()
            .all(|c| c.records.is_empty())
    }

    /// Drop every record in every collection.
    pub async fn clear(&self) {
        self.collections.write().await.clear();
    }

    /// Insert a record verbatim.
    ///
    /// Useful for seeding legacy or deliberately malformed records in tests.
    pub async fn insert_raw(&self, collection: &str, record: Record) -> StoreResult<()> {
        self.save(collection, record).await
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.records.get(id))
            .cloned())
    }

    async fn find(&self, collection: &str, filter: &Value) -> StoreResult<Vec<Record>> {
        let guard = self.collections.read().await;
        let Some(coll) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for id in &coll.order {
            if let Some(record) = coll.records.get(id) {
                if matches(record, filter)? {
                    out.push(record.clone());
                }
            }
        }
        Ok(out)
    }

    async fn save(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = record_id(collection, &record)?.to_string();
        let mut guard = self.collections.write().await;
        let coll = guard.entry(collection.to_string()).or_default();
        if coll.records.insert(id.clone(), record).is_none() {
            coll.order.push(id);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut guard = self.collections.write().await;
        if let Some(coll) = guard.get_mut(collection) {
            if coll.records.remove(id).is_some() {
                coll.order.retain(|existing| existing != id);
            }
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<usize> {
        let guard = self.collections.read().await;
        let Some(coll) = guard.get(collection) else {
            return Ok(0);
        };
        let mut n = 0;
        for record in coll.records.values() {
            if matches(record, filter)? {
                n += 1;
            }
        }
        Ok(n)
    }
}
