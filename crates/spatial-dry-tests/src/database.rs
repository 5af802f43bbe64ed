// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Instrumented in-memory store for exercising graph code paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use spatial_graph::GraphContext;
use spatial_store::{Database, MemoryDatabase, Record, StoreError, StoreResult};

/// The five store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// [`Database::get`].
    Get,
    /// [`Database::find`].
    Find,
    /// [`Database::save`].
    Save,
    /// [`Database::delete`].
    Delete,
    /// [`Database::count`].
    Count,
}

/// [`Database`] over a [`MemoryDatabase`] that counts calls, records every
/// `find` filter and fails selected operations on demand.
///
/// Clones share state, so a test can keep one handle for assertions and
/// hand another to a [`GraphContext`].
///
/// # Example
///
/// ```
/// use spatial_dry_tests::{InstrumentedDatabase, Op};
///
/// let db = InstrumentedDatabase::new();
/// db.set_failing(Op::Find, true);
/// assert_eq!(db.calls(Op::Find), 0);
/// ```
#[derive(Clone, Default)]
pub struct InstrumentedDatabase {
    store: Arc<MemoryDatabase>,
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    calls: HashMap<Op, usize>,
    saves: HashMap<String, usize>,
    failing: HashSet<Op>,
    finds: Vec<(String, Value)>,
}

impl InstrumentedDatabase {
    /// Empty store, nothing failing.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A graph context backed by this store.
    pub fn context(&self) -> GraphContext {
        GraphContext::new(Arc::new(self.clone()))
    }

    /// The wrapped store, for seeding raw records.
    pub fn memory(&self) -> &MemoryDatabase {
        &self.store
    }

    /// Make `op` fail with [`StoreError::Unavailable`] (or stop failing).
    pub fn set_failing(&self, op: Op, fail: bool) {
        let mut inner = self.lock();
        if fail {
            inner.failing.insert(op);
        } else {
            inner.failing.remove(&op);
        }
    }

    /// Number of `op` calls attempted, failed ones included.
    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of saves attempted into `collection`.
    pub fn saves_in(&self, collection: &str) -> usize {
        self.lock().saves.get(collection).copied().unwrap_or(0)
    }

    /// Every `(collection, filter)` passed to `find`, oldest first.
    pub fn finds(&self) -> Vec<(String, Value)> {
        self.lock().finds.clone()
    }

    /// Zero the counters and the recorded filters; stored records and
    /// failure flags are kept.
    pub fn reset_counters(&self) {
        let mut inner = self.lock();
        inner.calls.clear();
        inner.saves.clear();
        inner.finds.clear();
    }

    fn enter(&self, op: Op) -> StoreResult<()> {
        let mut inner = self.lock();
        *inner.calls.entry(op).or_default() += 1;
        if inner.failing.contains(&op) {
            return Err(StoreError::Unavailable(format!("simulated {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for InstrumentedDatabase {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        self.enter(Op::Get)?;
        self.store.get(collection, id).await
    }

    async fn find(&self, collection: &str, filter: &Value) -> StoreResult<Vec<Record>> {
        self.lock()
            .finds
            .push((collection.to_string(), filter.clone()));
        self.enter(Op::Find)?;
        self.store.find(collection, filter).await
    }

    async fn save(&self, collection: &str, record: Record) -> StoreResult<()> {
        *self
            .lock()
            .saves
            .entry(collection.to_string())
            .or_default() += 1;
        self.enter(Op::Save)?;
        self.store.save(collection, record).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.enter(Op::Delete)?;
        self.store.delete(collection, id).await
    }

    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<usize> {
        self.enter(Op::Count)?;
        self.store.count(collection, filter).await
    }
}
