// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::{json, Map};
use spatial_dry_tests::{star, InstrumentedDatabase};
use spatial_graph::{
    Direction, Entity, Node, NodeQuery, TrailTracker, Visitor, WalkerQueue,
};

struct Walker {
    id: String,
}

impl Visitor for Walker {
    fn walker_id(&self) -> &str {
        &self.id
    }
}

#[tokio::test]
async fn breadth_first_walk_records_trail() {
    let ctx = InstrumentedDatabase::new().context();
    let (hub, spokes) = star(&ctx, &[("a", 1), ("b", 2), ("c", 3)]).await.unwrap();

    let mut queue: WalkerQueue = WalkerQueue::new(10);
    let mut trail = TrailTracker::new();
    queue.visit([hub.clone()]);
    trail.record(&hub, None, Map::new());

    let current = queue.pop_front().unwrap();
    let edges = current.edges(Direction::Out).await.unwrap();
    let next = current.outgoing(NodeQuery::new()).await.unwrap();
    assert_eq!(queue.visit(next.clone()), 3);

    for (node, edge) in next.iter().zip(&edges) {
        let mut meta = Map::new();
        meta.insert("depth".into(), json!(1));
        trail.record(node, Some(edge), meta);
    }

    assert_eq!(
        trail.path(),
        [hub.id(), spokes[0].id(), spokes[1].id(), spokes[2].id()]
    );
    assert_eq!(
        trail.edge_path(),
        edges.iter().map(Entity::id).collect::<Vec<_>>()
    );
    assert_eq!(trail.recent(2), [spokes[1].id(), spokes[2].id()]);
    assert_eq!(trail.steps()[1].node_type, "City");
    assert_eq!(trail.steps()[1].metadata["depth"], 1);
}

#[tokio::test]
async fn queue_edits_work_on_nodes() {
    let ctx = InstrumentedDatabase::new().context();
    let (hub, spokes) = star(&ctx, &[("a", 1), ("b", 2)]).await.unwrap();

    let mut queue: WalkerQueue<Node> = WalkerQueue::new(2);
    assert_eq!(queue.visit(spokes.clone()), 2);
    assert_eq!(queue.visit([hub.clone()]), 0);
    queue.prepend([hub.clone()]);
    assert_eq!(queue.peek(), Some(&hub));

    assert!(queue.insert_after(&hub, [spokes[1].clone()]));
    let removed = queue.dequeue(&[spokes[1].clone()]);
    assert_eq!(removed.len(), 2);
    assert!(!queue.contains(&spokes[1]));
    assert_eq!(queue.pop_back(), Some(spokes[0].clone()));
}

#[tokio::test]
async fn nodes_hold_walkers_weakly() {
    let ctx = InstrumentedDatabase::new().context();
    let (mut hub, _) = star(&ctx, &[("a", 1)]).await.unwrap();
    let walker = Arc::new(Walker {
        id: "w:Walker:1".into(),
    });

    hub.set_visitor(&walker);
    assert_eq!(hub.visitor().unwrap().walker_id(), "w:Walker:1");

    // The visitor slot is never persisted.
    hub.save().await.unwrap();
    let stored = ctx.get_node(hub.id()).await.unwrap().unwrap();
    assert!(stored.visitor().is_none());

    drop(walker);
    assert!(hub.visitor().is_none());
}
