// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Graph vertices.

use std::sync::{Arc, Weak};

use serde_json::{Map, Value};
use spatial_store::Record;

use crate::edge::{Direction, Edge};
use crate::entity::{Entity, ObjectCore};
use crate::error::{GraphError, GraphResult};
use crate::kind::{Archetype, TypeCode};
use crate::query::NodeQuery;
use crate::root::ROOT_NAME;
use crate::walker::Visitor;

/// A persisted graph vertex (type code `n`).
///
/// `edge_ids` is the node's authoritative list of incident edges, in
/// connection order and free of duplicates. The visitor slot is a weak
/// handle: a node never keeps a walker alive, and the slot is never
/// persisted.
#[derive(Clone)]
pub struct Node {
    core: ObjectCore,
    edge_ids: Vec<String>,
    visitor: Option<Weak<dyn Visitor>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("core", &self.core)
            .field("edge_ids", &self.edge_ids)
            .field("visitor", &self.visitor().map(|v| v.walker_id().to_string()))
            .finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.core.id == other.core.id
    }
}

impl Node {
    /// `true` for the root singleton.
    pub fn is_root(&self) -> bool {
        self.core.name == ROOT_NAME
    }

    /// Append `edge_id` unless already present. Returns `true` if added.
    pub(crate) fn add_edge_id(&mut self, edge_id: &str) -> bool {
        if self.edge_ids.iter().any(|e| e == edge_id) {
            return false;
        }
        self.edge_ids.push(edge_id.to_string());
        true
    }

    /// Drop `edge_id`. Returns `true` if it was present.
    pub(crate) fn remove_edge_id(&mut self, edge_id: &str) -> bool {
        let before = self.edge_ids.len();
        self.edge_ids.retain(|e| e != edge_id);
        self.edge_ids.len() != before
    }

    /// Walker currently standing on this node, if it is still alive.
    pub fn visitor(&self) -> Option<Arc<dyn Visitor>> {
        self.visitor.as_ref().and_then(Weak::upgrade)
    }

    /// Mark `walker` as visiting this node without taking ownership.
    pub fn set_visitor<V: Visitor + 'static>(&mut self, walker: &Arc<V>) {
        let weak: Weak<dyn Visitor> = Arc::downgrade(walker) as Weak<dyn Visitor>;
        self.visitor = Some(weak);
    }

    /// Forget the visitor.
    pub fn clear_visitor(&mut self) {
        self.visitor = None;
    }

    /// Persist through the bound (or default) context.
    pub async fn save(&mut self) -> GraphResult<()> {
        let ctx = self.resolve_context()?;
        ctx.save(self).await
    }

    /// Delete through the bound (or default) context. See
    /// [`GraphContext::delete`](crate::GraphContext::delete).
    pub async fn delete(&self, cascade: bool) -> GraphResult<()> {
        let ctx = self.resolve_context()?;
        ctx.delete(self, cascade).await
    }

    /// Connect to `other` with a new edge of archetype `A`, saving the edge
    /// and both nodes.
    pub async fn connect<A>(
        &mut self,
        other: &mut Node,
        value: A,
        direction: Direction,
    ) -> GraphResult<Edge>
    where
        A: Archetype<Entity = Edge>,
    {
        let ctx = self.resolve_context()?;
        ctx.connect(self, other, value, direction).await
    }

    /// Remove every edge between this node and `other`. Returns how many
    /// edges were removed.
    pub async fn disconnect(&mut self, other: &mut Node) -> GraphResult<usize> {
        let ctx = self.resolve_context()?;
        ctx.disconnect(self, other, None).await
    }

    /// `true` if some incident edge reaches `other` in `direction`.
    pub async fn is_connected_to(&self, other: &Node, direction: Direction) -> GraphResult<bool> {
        Ok(self
            .edges(direction)
            .await?
            .iter()
            .any(|edge| edge.far_end(self.id(), direction) == Some(other.id())))
    }

    /// Connected nodes matching `query`, in connection order.
    pub async fn nodes(&self, query: NodeQuery) -> GraphResult<Vec<Node>> {
        let ctx = self.resolve_context()?;
        ctx.traverse(self, &query).await
    }

    /// First connected node matching `query`, fetched with a limit of one.
    pub async fn node(&self, query: NodeQuery) -> GraphResult<Option<Node>> {
        let ctx = self.resolve_context()?;
        Ok(ctx.traverse(self, &query.limit(1)).await?.into_iter().next())
    }

    /// Connected nodes in either direction.
    pub async fn neighbors(&self, query: NodeQuery) -> GraphResult<Vec<Node>> {
        self.nodes(query.direction(Direction::Both)).await
    }

    /// Nodes this node points at.
    pub async fn outgoing(&self, query: NodeQuery) -> GraphResult<Vec<Node>> {
        self.nodes(query.direction(Direction::Out)).await
    }

    /// Nodes pointing at this node.
    pub async fn incoming(&self, query: NodeQuery) -> GraphResult<Vec<Node>> {
        self.nodes(query.direction(Direction::In)).await
    }

    /// Incident edges: `Out` keeps edges sourced here, `In` edges targeting
    /// here, `Both` returns every incident edge. Connection order.
    pub async fn edges(&self, direction: Direction) -> GraphResult<Vec<Edge>> {
        let ctx = self.resolve_context()?;
        ctx.incident_edges(self, direction).await
    }
}

impl Entity for Node {
    const CODE: TypeCode = TypeCode::Node;
    const BASE: &'static str = "Node";

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn from_core(core: ObjectCore, record: &Record) -> GraphResult<Self> {
        let mut edge_ids: Vec<String> = Vec::new();
        match record.get("edges") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    let Some(edge_id) = item.as_str() else {
                        return Err(GraphError::corrupt(
                            &core.id,
                            format!("edge id is not a string: {item}"),
                        ));
                    };
                    if !edge_ids.iter().any(|e| e == edge_id) {
                        edge_ids.push(edge_id.to_string());
                    }
                }
            }
            Some(other) => {
                return Err(GraphError::corrupt(
                    &core.id,
                    format!("`edges` is not an array: {other}"),
                ))
            }
        }
        Ok(Self {
            core,
            edge_ids,
            visitor: None,
        })
    }

    fn to_record(&self) -> Record {
        let mut record = Map::new();
        record.insert("id".into(), Value::String(self.core.id.clone()));
        record.insert("name".into(), Value::String(self.core.name.clone()));
        record.insert("context".into(), Value::Object(self.core.exported_context()));
        record.insert(
            "edges".into(),
            Value::Array(self.edge_ids.iter().cloned().map(Value::String).collect()),
        );
        Value::Object(record)
    }

    fn edge_ids(&self) -> &[String] {
        &self.edge_ids
    }
}
