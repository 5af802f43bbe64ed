// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixture archetypes and small graph builders.

use serde::{Deserialize, Serialize};
use spatial_graph::{
    register_archetype, Archetype, Direction, Edge, GraphContext, GraphResult, Node, Object,
};

/// A node type with one numeric property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// Display label.
    pub label: String,
    /// Head count.
    pub population: u64,
}

impl Archetype for City {
    const NAME: &'static str = "City";
    type Entity = Node;
}

/// A subtype of [`City`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capital {
    /// Display label.
    pub label: String,
    /// Head count.
    pub population: u64,
    /// Country governed from here.
    pub country: String,
}

impl Archetype for Capital {
    const NAME: &'static str = "Capital";
    const PARENT: Option<&'static str> = Some("City");
    type Entity = Node;
}

/// An edge type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highway {
    /// Lane count.
    pub lanes: u32,
}

impl Archetype for Highway {
    const NAME: &'static str = "Highway";
    type Entity = Edge;
}

/// A second edge type, for edge filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Railway {
    /// Whether the line is electrified.
    pub electrified: bool,
}

impl Archetype for Railway {
    const NAME: &'static str = "Railway";
    type Entity = Edge;
}

/// An object type with a transient field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    /// Persisted.
    pub title: String,
    /// Kept in memory only.
    #[serde(default)]
    pub draft: Option<String>,
}

impl Archetype for Memo {
    const NAME: &'static str = "Memo";
    const TRANSIENT: &'static [&'static str] = &["draft"];
    type Entity = Object;
}

register_archetype!(City, Capital, Highway, Railway, Memo);

/// Create a [`City`] node.
pub async fn city(ctx: &GraphContext, label: &str, population: u64) -> GraphResult<Node> {
    ctx.create(City {
        label: label.to_string(),
        population,
    })
    .await
}

/// Connect `from` to `to` with an outgoing two-lane [`Highway`].
pub async fn highway(from: &mut Node, to: &mut Node) -> GraphResult<Edge> {
    from.connect(to, Highway { lanes: 2 }, Direction::Out).await
}

/// A hub city with one outgoing highway per `(label, population)` spoke, in
/// order. Returns the hub (with its edge list current) and the spokes.
pub async fn star(
    ctx: &GraphContext,
    spokes: &[(&str, u64)],
) -> GraphResult<(Node, Vec<Node>)> {
    let mut hub = city(ctx, "hub", 0).await?;
    let mut out = Vec::with_capacity(spokes.len());
    for (label, population) in spokes {
        let mut spoke = city(ctx, label, *population).await?;
        highway(&mut hub, &mut spoke).await?;
        out.push(spoke);
    }
    Ok((hub, out))
}

/// Install a test-friendly `tracing` subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .try_init();
}
