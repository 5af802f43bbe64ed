// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use spatial_dry_tests::{city, highway, init_tracing, Highway, InstrumentedDatabase, Memo, Op};
use spatial_graph::{Direction, Entity, GraphContext, Node, Root, ROOT_ID};

async fn exists(ctx: &GraphContext, node: &Node) -> bool {
    ctx.get_node(node.id()).await.unwrap().is_some()
}

async fn stored_edges(ctx: &GraphContext, node: &Node) -> Vec<String> {
    ctx.get_node(node.id())
        .await
        .unwrap()
        .map(|n| n.edge_ids().to_vec())
        .unwrap_or_default()
}

#[tokio::test]
async fn cascade_deletes_orphaned_neighbors() {
    init_tracing();
    let ctx = InstrumentedDatabase::new().context();
    let mut parent = city(&ctx, "parent", 0).await.unwrap();
    let mut child = city(&ctx, "child", 0).await.unwrap();
    let edge = highway(&mut parent, &mut child).await.unwrap();

    parent.delete(true).await.unwrap();

    assert!(!exists(&ctx, &parent).await);
    assert!(!exists(&ctx, &child).await);
    assert!(ctx.get_edge(edge.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn cascade_keeps_nodes_that_remain_connected() {
    let ctx = InstrumentedDatabase::new().context();
    let mut parent = city(&ctx, "parent", 0).await.unwrap();
    let mut child1 = city(&ctx, "child1", 0).await.unwrap();
    let mut child2 = city(&ctx, "child2", 0).await.unwrap();
    let mut shared = city(&ctx, "shared", 0).await.unwrap();
    let gone1 = highway(&mut parent, &mut child1).await.unwrap();
    let gone2 = highway(&mut parent, &mut child2).await.unwrap();
    let kept1 = highway(&mut child1, &mut shared).await.unwrap();
    let kept2 = highway(&mut child2, &mut shared).await.unwrap();

    parent.delete(true).await.unwrap();

    assert!(!exists(&ctx, &parent).await);
    for edge in [&gone1, &gone2] {
        assert!(ctx.get_edge(edge.id()).await.unwrap().is_none());
    }
    for edge in [&kept1, &kept2] {
        assert!(ctx.get_edge(edge.id()).await.unwrap().is_some());
    }
    assert_eq!(stored_edges(&ctx, &child1).await, [kept1.id().to_string()]);
    assert_eq!(stored_edges(&ctx, &child2).await, [kept2.id().to_string()]);
    assert_eq!(
        stored_edges(&ctx, &shared).await,
        [kept1.id().to_string(), kept2.id().to_string()]
    );
}

#[tokio::test]
async fn cascade_deletes_every_neighbor_left_edgeless() {
    let ctx = InstrumentedDatabase::new().context();
    let mut a = city(&ctx, "a", 0).await.unwrap();
    let mut b = city(&ctx, "b", 0).await.unwrap();
    let mut c = city(&ctx, "c", 0).await.unwrap();
    highway(&mut a, &mut b).await.unwrap();
    highway(&mut b, &mut c).await.unwrap();

    b.delete(true).await.unwrap();

    assert!(!exists(&ctx, &b).await);
    assert!(!exists(&ctx, &a).await);
    assert!(!exists(&ctx, &c).await);
}

#[tokio::test]
async fn without_cascade_neighbors_are_pruned_but_kept() {
    let ctx = InstrumentedDatabase::new().context();
    let mut parent = city(&ctx, "parent", 0).await.unwrap();
    let mut child = city(&ctx, "child", 0).await.unwrap();
    let edge = highway(&mut parent, &mut child).await.unwrap();

    parent.delete(false).await.unwrap();

    assert!(!exists(&ctx, &parent).await);
    assert!(ctx.get_edge(edge.id()).await.unwrap().is_none());
    assert!(exists(&ctx, &child).await);
    assert!(stored_edges(&ctx, &child).await.is_empty());
}

#[tokio::test]
async fn self_loops_are_removed_with_the_node() {
    let ctx = InstrumentedDatabase::new().context();
    let mut node = city(&ctx, "loop", 0).await.unwrap();
    let mut again = node.clone();
    let edge = highway(&mut node, &mut again).await.unwrap();
    assert_eq!(edge.source(), edge.target());

    node.delete(true).await.unwrap();
    assert!(!exists(&ctx, &node).await);
    assert!(ctx.get_edge(edge.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn cascade_never_removes_the_root() {
    let ctx = InstrumentedDatabase::new().context();
    let mut root = Root::get(&ctx).await.unwrap();
    let mut leaf = city(&ctx, "leaf", 0).await.unwrap();
    root.connect(&mut leaf, Highway::default(), Direction::Out)
        .await
        .unwrap();

    leaf.delete(true).await.unwrap();

    let root = ctx.get_node(ROOT_ID).await.unwrap().unwrap();
    assert!(root.is_root());
    assert!(root.edge_ids().is_empty());
}

#[tokio::test]
async fn edge_cleanup_failures_do_not_stop_the_delete() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    let mut parent = city(&ctx, "parent", 0).await.unwrap();
    let mut child = city(&ctx, "child", 0).await.unwrap();
    highway(&mut parent, &mut child).await.unwrap();

    db.set_failing(Op::Get, true);
    parent.delete(true).await.unwrap();
    db.set_failing(Op::Get, false);

    assert!(!exists(&ctx, &parent).await);
    // The edge could not be loaded, so the child was never visited.
    assert!(exists(&ctx, &child).await);
}

#[tokio::test]
async fn objects_and_edges_delete_directly() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    let memo = ctx.create(Memo::default()).await.unwrap();
    memo.delete().await.unwrap();
    assert!(ctx.get::<Memo>(memo.id()).await.unwrap().is_none());

    let mut a = city(&ctx, "a", 0).await.unwrap();
    let mut b = city(&ctx, "b", 0).await.unwrap();
    let edge = highway(&mut a, &mut b).await.unwrap();
    db.reset_counters();
    edge.delete().await.unwrap();
    assert_eq!(db.calls(Op::Delete), 1);
    assert_eq!(db.calls(Op::Save), 0);
}
