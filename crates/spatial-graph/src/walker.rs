// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frontier and history structures for an external walker driver.
//!
//! The graph layer does not dispatch walker logic. A driver owns a
//! [`WalkerQueue`] of nodes still to visit and a [`TrailTracker`] of where it
//! has been, and marks nodes with a non-owning [`Visitor`] handle while it
//! stands on them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::edge::Edge;
use crate::entity::Entity;
use crate::node::Node;

/// Cap applied by [`WalkerQueue::default`].
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// Identity of a walker as seen from the node it is visiting.
///
/// Nodes hold visitors weakly; dropping the last strong handle of the walker
/// clears every node's `visitor()`.
pub trait Visitor: Send + Sync {
    /// Walker id, conventionally `"w:{TypeName}:{uuid}"`.
    fn walker_id(&self) -> &str;
}

/// Double-ended visit queue with an advisory size cap.
///
/// # Capacity Invariants
///
/// - [`visit`](WalkerQueue::visit) stops accepting once `len() == max_size`
///   and drops the remainder without error.
/// - [`append`](WalkerQueue::append) and [`prepend`](WalkerQueue::prepend)
///   ignore the cap.
#[derive(Debug, Clone)]
pub struct WalkerQueue<T = Node> {
    items: VecDeque<T>,
    max_size: usize,
}

impl<T> Default for WalkerQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

impl<T> WalkerQueue<T> {
    /// Empty queue capped at `max_size` for [`visit`](Self::visit).
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Configured cap.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enqueue while under the cap. Returns how many items were accepted.
    pub fn visit<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut accepted = 0;
        for item in items {
            if self.items.len() >= self.max_size {
                break;
            }
            self.items.push_back(item);
            accepted += 1;
        }
        accepted
    }

    /// Push to the back regardless of the cap.
    pub fn append<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.items.extend(items);
    }

    /// Push to the front regardless of the cap, keeping `items`' order.
    pub fn prepend<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let incoming: Vec<T> = items.into_iter().collect();
        for item in incoming.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    /// Take the next item.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Take the last item.
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Look at the next item.
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Iterate front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Empty the queue.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: PartialEq> WalkerQueue<T> {
    /// Remove every occurrence of each item in `items`, returning what was
    /// removed in queue order.
    pub fn dequeue(&mut self, items: &[T]) -> Vec<T> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if items.contains(&item) {
                removed.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.items = kept;
        removed
    }

    /// Insert `items` right after the first occurrence of `anchor`.
    ///
    /// Returns `false` (and inserts nothing) when `anchor` is not queued.
    pub fn insert_after<I>(&mut self, anchor: &T, items: I) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        let Some(pos) = self.items.iter().position(|item| item == anchor) else {
            return false;
        };
        for (offset, item) in items.into_iter().enumerate() {
            self.items.insert(pos + 1 + offset, item);
        }
        true
    }

    /// `true` if `item` is queued.
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}

/// One step of a walker's trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailStep {
    /// Node stood on.
    pub node_id: String,
    /// Type name of that node.
    pub node_type: String,
    /// Edge taken to arrive, if any.
    pub edge_id: Option<String>,
    /// Driver-supplied annotations.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Append-only record of visited nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailTracker {
    steps: Vec<TrailStep>,
}

impl TrailTracker {
    /// Empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record arrival at `node`, optionally via `edge`.
    pub fn record(&mut self, node: &Node, edge: Option<&Edge>, metadata: Map<String, Value>) {
        self.steps.push(TrailStep {
            node_id: node.id().to_string(),
            node_type: node.type_name().to_string(),
            edge_id: edge.map(|e| e.id().to_string()),
            metadata,
        });
    }

    /// Every step, oldest first.
    pub fn steps(&self) -> &[TrailStep] {
        &self.steps
    }

    /// Visited node ids, oldest first.
    pub fn path(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node_id.as_str()).collect()
    }

    /// Edge ids taken, oldest first; arrivals without an edge are skipped.
    pub fn edge_path(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.edge_id.as_deref())
            .collect()
    }

    /// The last `n` visited node ids, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&str> {
        let start = self.steps.len().saturating_sub(n);
        self.steps[start..]
            .iter()
            .map(|s| s.node_id.as_str())
            .collect()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` before the first step.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Forget every step.
    pub fn clear(&mut self) {
        self.steps.clear();
    }
}
