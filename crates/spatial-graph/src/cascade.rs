// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entity deletion, including node removal with edge cleanup.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, instrument, warn};

use crate::context::GraphContext;
use crate::entity::Entity;
use crate::error::GraphResult;
use crate::kind::TypeCode;

type DeleteFuture<'a> = Pin<Box<dyn Future<Output = GraphResult<()>> + Send + 'a>>;

impl GraphContext {
    /// Delete `entity`.
    ///
    /// Objects and edges are removed directly; deleting an edge this way does
    /// not touch its endpoints. A node first detaches every incident edge:
    /// the edge record is deleted and the edge id is pruned from the node on
    /// the other end. With `cascade`, a node left with no edges is deleted
    /// too, recursively. The root node is never removed by a cascade.
    ///
    /// Failures while detaching a single edge are logged and skipped; the
    /// node's own record is always removed last.
    #[instrument(skip_all, fields(id = entity.id(), cascade = cascade))]
    pub async fn delete<E: Entity>(&self, entity: &E, cascade: bool) -> GraphResult<()> {
        if E::CODE == TypeCode::Node {
            return self
                .delete_node(entity.id().to_string(), entity.edge_ids().to_vec(), cascade)
                .await;
        }
        self.database()
            .delete(E::CODE.collection(), entity.id())
            .await?;
        Ok(())
    }

    fn delete_node(&self, id: String, edge_ids: Vec<String>, cascade: bool) -> DeleteFuture<'_> {
        Box::pin(async move {
            for edge_id in &edge_ids {
                if let Err(err) = self.detach_edge(&id, edge_id, cascade).await {
                    warn!(%err, node = %id, edge = %edge_id, "edge cleanup failed; continuing");
                }
            }
            self.database()
                .delete(TypeCode::Node.collection(), &id)
                .await?;
            debug!(node = %id, "node deleted");
            Ok(())
        })
    }

    async fn detach_edge(&self, id: &str, edge_id: &str, cascade: bool) -> GraphResult<()> {
        let edge = self.get_edge(edge_id).await?;
        self.database()
            .delete(TypeCode::Edge.collection(), edge_id)
            .await?;
        let Some(edge) = edge else {
            return Ok(());
        };
        let Some(other_id) = edge.other(id) else {
            return Ok(());
        };
        if other_id.is_empty() || other_id == id {
            return Ok(());
        }
        let Some(mut other) = self.get_node(other_id).await? else {
            return Ok(());
        };
        other.remove_edge_id(edge_id);
        self.save(&mut other).await?;
        if cascade && other.edge_ids().is_empty() && !other.is_root() {
            debug!(orphan = other.id(), "cascading delete");
            self.delete_node(other.id().to_string(), Vec::new(), true)
                .await?;
        }
        Ok(())
    }
}
