// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spatial_dry_tests::{
    city, highway, init_tracing, star, Capital, Highway, InstrumentedDatabase, Op, Railway,
};
use spatial_graph::{
    register_archetype, Archetype, Direction, Entity, GraphError, Node, NodeQuery, TypeCondition,
    TypeFilter,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Town {
    label: String,
}

impl Archetype for Town {
    const NAME: &'static str = "Town";
    type Entity = Node;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Hamlet {
    label: String,
}

impl Archetype for Hamlet {
    const NAME: &'static str = "Hamlet";
    const PARENT: Option<&'static str> = Some("Town");
    type Entity = Node;
}

register_archetype!(Town, Hamlet);

fn labels(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| {
            n.get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

fn big_cities() -> TypeCondition {
    TypeCondition::new("City").with("population", json!({"$gte": 50_000}))
}

#[tokio::test]
async fn results_follow_connection_order_not_store_order() {
    init_tracing();
    let ctx = InstrumentedDatabase::new().context();
    let mut hub = city(&ctx, "A", 0).await.unwrap();
    let mut d = city(&ctx, "D", 0).await.unwrap();
    let mut c = city(&ctx, "C", 0).await.unwrap();
    let mut b = city(&ctx, "B", 0).await.unwrap();
    for spoke in [&mut b, &mut c, &mut d] {
        highway(&mut hub, spoke).await.unwrap();
    }

    let out = hub.nodes(NodeQuery::new()).await.unwrap();
    assert_eq!(labels(&out), ["B", "C", "D"]);
    let first = hub.node(NodeQuery::new()).await.unwrap().unwrap();
    assert_eq!(first, b);
}

#[tokio::test]
async fn node_filters_run_in_the_store() {
    let ctx = InstrumentedDatabase::new().context();
    let (hub, _) = star(&ctx, &[("a", 10_000), ("b", 60_000), ("c", 600_000)])
        .await
        .unwrap();

    let big = hub.nodes(NodeQuery::new().node(big_cities())).await.unwrap();
    assert_eq!(labels(&big), ["b", "c"]);

    let parsed = TypeFilter::from_value(&json!([
        {"City": {"context.population": {"$gte": 50_000}}}
    ]))
    .unwrap();
    let big = hub.nodes(NodeQuery::new().node(parsed)).await.unwrap();
    assert_eq!(labels(&big), ["b", "c"]);

    let only_b = hub
        .nodes(NodeQuery::new().property("label", "b"))
        .await
        .unwrap();
    assert_eq!(labels(&only_b), ["b"]);

    assert!(hub
        .nodes(NodeQuery::new().node("Village"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn type_names_match_registered_subtypes() {
    let ctx = InstrumentedDatabase::new().context();
    let (mut hub, _) = star(&ctx, &[("plain", 1)]).await.unwrap();
    let mut capital = ctx
        .create(Capital {
            label: "capital".into(),
            population: 1,
            country: "XX".into(),
        })
        .await
        .unwrap();
    highway(&mut hub, &mut capital).await.unwrap();

    let cities = hub.nodes(NodeQuery::new().node("City")).await.unwrap();
    assert_eq!(labels(&cities), ["plain", "capital"]);
    let capitals = hub.nodes(NodeQuery::new().node(["Capital"])).await.unwrap();
    assert_eq!(labels(&capitals), ["capital"]);
    assert_eq!(capitals[0].type_name(), "Capital");
}

#[tokio::test]
async fn limit_applies_to_candidates_before_node_filters() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    let (hub, _) = star(&ctx, &[("a", 10_000), ("b", 60_000), ("c", 600_000)])
        .await
        .unwrap();

    db.reset_counters();
    let first = hub.node(NodeQuery::new().node("City")).await.unwrap().unwrap();
    assert_eq!(labels(&[first]), ["a"]);
    let finds = db.finds();
    let (collection, node_query) = finds.last().unwrap();
    assert_eq!(collection, "node");
    assert_eq!(node_query["$and"][0]["id"]["$in"].as_array().unwrap().len(), 1);
    assert_eq!(db.calls(Op::Find), 2);

    // The single candidate is `a`, which the node filter then rejects.
    let none = hub
        .nodes(NodeQuery::new().limit(1).node(big_cities()))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn nodes_without_edges_skip_the_store() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    let lonely = city(&ctx, "lonely", 1).await.unwrap();
    db.reset_counters();

    assert!(lonely.neighbors(NodeQuery::new()).await.unwrap().is_empty());
    assert!(lonely.edges(Direction::Both).await.unwrap().is_empty());
    assert_eq!(db.calls(Op::Find), 0);
    assert_eq!(db.calls(Op::Get), 0);
}

#[tokio::test]
async fn direction_selects_which_end_is_followed() {
    let ctx = InstrumentedDatabase::new().context();
    let (hub, spokes) = star(&ctx, &[("a", 1), ("b", 2)]).await.unwrap();
    let b = &spokes[1];

    assert_eq!(labels(&b.incoming(NodeQuery::new()).await.unwrap()), ["hub"]);
    assert!(b.outgoing(NodeQuery::new()).await.unwrap().is_empty());
    assert_eq!(labels(&b.neighbors(NodeQuery::new()).await.unwrap()), ["hub"]);
    assert_eq!(
        labels(&hub.neighbors(NodeQuery::new()).await.unwrap()),
        ["a", "b"]
    );

    assert!(hub.is_connected_to(b, Direction::Out).await.unwrap());
    assert!(!b.is_connected_to(&hub, Direction::Out).await.unwrap());
    assert!(b.is_connected_to(&hub, Direction::In).await.unwrap());
}

#[tokio::test]
async fn edge_filters_select_traversed_edges() {
    let ctx = InstrumentedDatabase::new().context();
    let mut hub = city(&ctx, "hub", 0).await.unwrap();
    let mut road = city(&ctx, "road", 0).await.unwrap();
    let mut rail = city(&ctx, "rail", 0).await.unwrap();
    hub.connect(&mut road, Highway { lanes: 4 }, Direction::Out)
        .await
        .unwrap();
    hub.connect(&mut rail, Railway { electrified: true }, Direction::Out)
        .await
        .unwrap();

    let by_rail = hub.nodes(NodeQuery::new().edge("Railway")).await.unwrap();
    assert_eq!(labels(&by_rail), ["rail"]);
    let wide = hub
        .nodes(
            NodeQuery::new().edge(TypeCondition::new("Highway").with("lanes", json!({"$gt": 2}))),
        )
        .await
        .unwrap();
    assert_eq!(labels(&wide), ["road"]);

    let edges = hub.edges(Direction::Out).await.unwrap();
    let types: Vec<_> = edges.iter().map(Entity::type_name).collect();
    assert_eq!(types, ["Highway", "Railway"]);
    assert!(rail.edges(Direction::Out).await.unwrap().is_empty());
    assert_eq!(rail.edges(Direction::Both).await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_failure_falls_back_to_unfiltered_edge_list() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    let (hub, _) = star(&ctx, &[("a", 10_000), ("b", 60_000), ("c", 600_000)])
        .await
        .unwrap();

    db.set_failing(Op::Find, true);
    let all = hub.nodes(NodeQuery::new().node(big_cities())).await.unwrap();
    assert_eq!(labels(&all), ["a", "b", "c"]);
    let capped = hub.nodes(NodeQuery::new().limit(2)).await.unwrap();
    assert_eq!(labels(&capped), ["a", "b"]);
}

#[tokio::test]
async fn traversal_error_carries_both_failures() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    let (hub, _) = star(&ctx, &[("a", 1)]).await.unwrap();

    db.set_failing(Op::Find, true);
    db.set_failing(Op::Get, true);
    let err = hub.nodes(NodeQuery::new()).await.unwrap_err();
    match err {
        GraphError::Traversal { primary, fallback } => {
            assert!(matches!(*primary, GraphError::Store(_)));
            assert!(matches!(*fallback, GraphError::Store(_)));
        }
        other => panic!("expected traversal error, got {other}"),
    }
}

#[tokio::test]
async fn disconnect_removes_edges_from_both_ends() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    let mut hub = city(&ctx, "hub", 0).await.unwrap();
    let mut x = city(&ctx, "x", 0).await.unwrap();
    let mut y = city(&ctx, "y", 0).await.unwrap();
    let edge = highway(&mut hub, &mut x).await.unwrap();
    highway(&mut hub, &mut y).await.unwrap();

    assert_eq!(hub.disconnect(&mut x).await.unwrap(), 1);
    assert_eq!(hub.edge_ids().len(), 1);
    assert!(x.edge_ids().is_empty());
    assert!(ctx.get_edge(edge.id()).await.unwrap().is_none());

    let stored = ctx.get_node(hub.id()).await.unwrap().unwrap();
    assert_eq!(stored.edge_ids(), hub.edge_ids());
    assert_eq!(labels(&stored.nodes(NodeQuery::new()).await.unwrap()), ["y"]);
    assert_eq!(hub.disconnect(&mut x).await.unwrap(), 0);
}

#[tokio::test]
async fn dangling_edge_ids_are_ignored() {
    let ctx = InstrumentedDatabase::new().context();
    let (hub, _) = star(&ctx, &[("a", 1), ("b", 2)]).await.unwrap();
    let first = ctx.get_edge(&hub.edge_ids()[0]).await.unwrap().unwrap();
    first.delete().await.unwrap();

    let stored = ctx.get_node(hub.id()).await.unwrap().unwrap();
    assert_eq!(stored.edge_ids().len(), 2);
    assert_eq!(labels(&stored.nodes(NodeQuery::new()).await.unwrap()), ["b"]);
}

#[tokio::test]
async fn declared_subtypes_match_parent_type_filters() {
    let db = InstrumentedDatabase::new();
    let ctx = db.context();
    db.memory()
        .insert_raw(
            "node",
            json!({"id": "n:Hamlet:1", "name": "Hamlet", "context": {"label": "h"}, "edges": []}),
        )
        .await
        .unwrap();
    let mut hub = city(&ctx, "hub", 0).await.unwrap();
    let mut hamlet = ctx.get_node("n:Hamlet:1").await.unwrap().unwrap();
    highway(&mut hub, &mut hamlet).await.unwrap();

    let towns = hub.nodes(NodeQuery::new().node("Town")).await.unwrap();
    assert_eq!(labels(&towns), ["h"]);
    assert_eq!(towns[0].type_name(), "Hamlet");
}
