// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node traversal.
//!
//! The primary path pushes every filter into the store: one query over the
//! node's incident edges, then one query over the candidate endpoints. When
//! either query fails, traversal retries over the edge list one record at a
//! time with all filters ignored, so a filter the store cannot evaluate
//! degrades to an unfiltered walk instead of an error.

use tracing::{debug, instrument, warn};

use crate::context::GraphContext;
use crate::edge::{Direction, Edge};
use crate::entity::Entity;
use crate::error::{GraphError, GraphResult};
use crate::kind::{AnyEdge, AnyNode, KindInfo, TypeCode};
use crate::node::Node;
use crate::query::{and_all, direction_clause, id_in, property_filter, NodeQuery};

/// Keep the first occurrence of each non-empty id, up to `limit` ids.
fn candidate_ids<'a>(ends: impl Iterator<Item = &'a str>, limit: Option<usize>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for end in ends {
        if end.is_empty() || out.iter().any(|seen| seen == end) {
            continue;
        }
        out.push(end.to_string());
    }
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}

fn sort_by_position<T>(items: &mut [T], order: &[String], id_of: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| {
        order
            .iter()
            .position(|id| id == id_of(item))
            .unwrap_or(usize::MAX)
    });
}

impl GraphContext {
    /// Nodes connected to `node` that satisfy `query`, in the order their
    /// edges appear in `node`'s edge list.
    #[instrument(skip_all, fields(node = node.id(), direction = query.direction.as_str()))]
    pub(crate) async fn traverse(&self, node: &Node, query: &NodeQuery) -> GraphResult<Vec<Node>> {
        if node.edge_ids().is_empty() {
            return Ok(Vec::new());
        }
        match self.traverse_filtered(node, query).await {
            Ok(nodes) => Ok(nodes),
            Err(primary) => {
                warn!(%primary, "filtered traversal failed; walking the edge list");
                self.traverse_edge_list(node, query.direction, query.limit)
                    .await
                    .map_err(|fallback| GraphError::Traversal {
                        primary: Box::new(primary),
                        fallback: Box::new(fallback),
                    })
            }
        }
    }

    async fn traverse_filtered(&self, node: &Node, query: &NodeQuery) -> GraphResult<Vec<Node>> {
        let mut edge_parts = vec![
            id_in(node.edge_ids()),
            direction_clause(query.direction, node.id()),
        ];
        if let Some(filter) = &query.edge_filter {
            edge_parts.push(filter.to_document(TypeCode::Edge));
        }
        let records = self
            .database()
            .find(TypeCode::Edge.collection(), &and_all(edge_parts))
            .await?;
        let mut edges: Vec<Edge> = self.hydrate_all(KindInfo::of::<AnyEdge>(), &records);
        sort_by_position(&mut edges, node.edge_ids(), |e| e.id());

        let candidates = candidate_ids(
            edges
                .iter()
                .filter_map(|e| e.far_end(node.id(), query.direction)),
            query.limit,
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut node_parts = vec![id_in(&candidates)];
        if let Some(filter) = &query.node_filter {
            node_parts.push(filter.to_document(TypeCode::Node));
        }
        node_parts.push(property_filter(TypeCode::Node, &query.properties));
        let records = self
            .database()
            .find(TypeCode::Node.collection(), &and_all(node_parts))
            .await?;
        let mut nodes: Vec<Node> = self.hydrate_all(KindInfo::of::<AnyNode>(), &records);
        sort_by_position(&mut nodes, &candidates, |n| n.id());
        debug!(edges = edges.len(), nodes = nodes.len(), "traversed");
        Ok(nodes)
    }

    async fn traverse_edge_list(
        &self,
        node: &Node,
        direction: Direction,
        limit: Option<usize>,
    ) -> GraphResult<Vec<Node>> {
        let mut edges = Vec::with_capacity(node.edge_ids().len());
        for edge_id in node.edge_ids() {
            if let Some(edge) = self.get_edge(edge_id).await? {
                edges.push(edge);
            }
        }
        let candidates = candidate_ids(
            edges.iter().filter_map(|e| e.far_end(node.id(), direction)),
            limit,
        );
        let mut nodes = Vec::with_capacity(candidates.len());
        for id in &candidates {
            if let Some(found) = self.get_node(id).await? {
                nodes.push(found);
            }
        }
        Ok(nodes)
    }

    /// Edges incident to `node` in `direction`, in edge-list order.
    #[instrument(skip_all, fields(node = node.id(), direction = direction.as_str()))]
    pub(crate) async fn incident_edges(
        &self,
        node: &Node,
        direction: Direction,
    ) -> GraphResult<Vec<Edge>> {
        if node.edge_ids().is_empty() {
            return Ok(Vec::new());
        }
        let filter = and_all(vec![
            id_in(node.edge_ids()),
            direction_clause(direction, node.id()),
        ]);
        let records = self
            .database()
            .find(TypeCode::Edge.collection(), &filter)
            .await?;
        let mut edges: Vec<Edge> = self.hydrate_all(KindInfo::of::<AnyEdge>(), &records);
        sort_by_position(&mut edges, node.edge_ids(), |e| e.id());
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_dedupe_skip_dangling_and_truncate() {
        let ends = ["b", "", "c", "b", "d"];
        assert_eq!(candidate_ids(ends.into_iter(), None), ["b", "c", "d"]);
        assert_eq!(candidate_ids(ends.into_iter(), Some(2)), ["b", "c"]);
        assert!(candidate_ids(ends.into_iter(), Some(0)).is_empty());
    }

    #[test]
    fn unknown_ids_sort_last() {
        let order = vec!["x".to_string(), "y".to_string()];
        let mut items = vec!["z", "y", "x"];
        sort_by_position(&mut items, &order, |s| *s);
        assert_eq!(items, ["x", "y", "z"]);
    }
}
