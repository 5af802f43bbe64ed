// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted object graph over a [`spatial_store::Database`].
//!
//! Three entity shapes share one identity and property model:
//!
//! - [`Object`]: a flat record in the `object` collection.
//! - [`Node`]: a vertex with an ordered list of incident edge ids.
//! - [`Edge`]: a connection between two node ids with a direction indicator.
//!
//! User types describe their properties as serde structs implementing
//! [`Archetype`]; the type name is stored next to the id and resolved back
//! through the registry so subtypes survive a round-trip. Declare archetypes
//! with [`register_archetype!`] so reads resolve them before anything else
//! has used the type.
//!
//! # Contexts
//!
//! All persistence goes through a [`GraphContext`]. Entities remember the
//! context that created or loaded them; entities without one use the
//! process-wide default ([`default_context`]), configured from the
//! environment on first use.
//!
//! # Traversal
//!
//! [`Node::nodes`] and its wrappers push type, property and edge filters into
//! the store and return results in connection order. See [`NodeQuery`].
//!
//! # Root
//!
//! Every store has exactly one [`Root`] node at [`ROOT_ID`].
#![forbid(unsafe_code)]

mod cascade;
mod context;
mod edge;
mod entity;
mod error;
mod kind;
mod node;
pub mod query;
mod root;
mod traversal;
mod walker;

pub use context::{default_context, reset_default_context, set_default_context, GraphContext};
pub use edge::{normalize_endpoints, Direction, Edge, Endpoints};
#[doc(hidden)]
pub use entity::ObjectCore;
pub use entity::{generate_id, Entity, Object, DATA_KEY};
pub use error::{GraphError, GraphResult};
pub use kind::{
    descendants, is_a, lookup, register, AnyEdge, AnyNode, AnyObject, Archetype, KindInfo,
    TypeCode,
};
pub use node::Node;
pub use query::{NodeQuery, TypeCondition, TypeFilter};
pub use root::{Root, ROOT_ID, ROOT_NAME};
pub use walker::{TrailStep, TrailTracker, Visitor, WalkerQueue, DEFAULT_MAX_QUEUE_SIZE};

/// Items [`register_archetype!`] expands to.
#[doc(hidden)]
pub mod __private {
    pub use crate::kind::KindRegistration;
    pub use inventory;
}
