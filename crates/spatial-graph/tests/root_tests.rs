// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use spatial_dry_tests::{InstrumentedDatabase, Op};
use spatial_graph::{Entity, GraphContext, GraphError, Root, ROOT_ID};
use spatial_store::{Database, Record, StoreResult};

/// Accepts writes and forgets them.
struct Forgetful;

#[async_trait]
impl Database for Forgetful {
    async fn get(&self, _collection: &str, _id: &str) -> StoreResult<Option<Record>> {
        Ok(None)
    }

    async fn find(&self, _collection: &str, _filter: &Value) -> StoreResult<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn save(&self, _collection: &str, _record: Record) -> StoreResult<()> {
        Ok(())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn count(&self, _collection: &str, _filter: &Value) -> StoreResult<usize> {
        Ok(0)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_create_one_root() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let ctx = ctx.clone();
        tasks.push(tokio::spawn(async move { Root::get(&ctx).await }));
    }
    for task in tasks {
        let root = task.await.unwrap().unwrap();
        assert_eq!(root.id(), ROOT_ID);
        assert!(root.is_root());
    }

    assert_eq!(db.saves_in("node"), 1);
    assert_eq!(db.memory().len("node").await, 1);
}

#[tokio::test]
async fn creating_the_root_archetype_returns_the_singleton() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();

    let first = ctx.create(Root::default()).await.unwrap();
    let second = ctx
        .create_with_id("n:Root:elsewhere", Root::default())
        .await
        .unwrap();
    assert_eq!(first.id(), ROOT_ID);
    assert_eq!(second.id(), ROOT_ID);
    assert_eq!(db.saves_in("node"), 1);
    assert_eq!(ctx.get::<Root>(ROOT_ID).await.unwrap().unwrap(), first);
}

#[tokio::test]
async fn saving_a_stray_root_moves_it_to_the_fixed_id() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    db.memory()
        .insert_raw(
            "node",
            json!({"id": "n:Root:stray", "name": "Root", "context": {}, "edges": []}),
        )
        .await
        .unwrap();

    let mut stray = ctx.get::<Root>("n:Root:stray").await.unwrap().unwrap();
    assert_eq!(stray.id(), "n:Root:stray");
    stray.save().await.unwrap();

    assert_eq!(stray.id(), ROOT_ID);
    assert!(db.memory().get("node", ROOT_ID).await.unwrap().is_some());
}

#[tokio::test]
async fn unreadable_root_is_an_error_not_a_rewrite() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    db.memory()
        .insert_raw(
            "node",
            json!({"id": ROOT_ID, "name": "Root", "context": [1, 2]}),
        )
        .await
        .unwrap();
    db.reset_counters();

    let err = Root::get(&ctx).await.unwrap_err();
    assert!(matches!(err, GraphError::Deserialization { ref id, .. } if id == ROOT_ID));
    assert_eq!(db.calls(Op::Save), 0);
}

#[tokio::test]
async fn root_that_does_not_read_back_is_a_singleton_violation() {
    let ctx = GraphContext::new(Arc::new(Forgetful));
    let err = Root::get(&ctx).await.unwrap_err();
    assert!(matches!(
        err,
        GraphError::SingletonViolation { ref expected, found: None } if expected == ROOT_ID
    ));
}
