// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the graph layer.
//!
//! A missing entity is never an error: lookups return `Ok(None)`. Per-record
//! decoding failures are recovered inside bulk reads and only surface from
//! direct reconstruction helpers.

use spatial_store::StoreError;
use thiserror::Error;

/// Errors raised by graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The backing store failed.
    #[error("[GRAPH_STORE] {0}")]
    Store(#[from] StoreError),
    /// A stored record could not be turned back into an entity.
    #[error("[GRAPH_DESERIALIZE] record `{id}`: {reason}")]
    Deserialization {
        /// Id of the offending record (`?` when it had none).
        id: String,
        /// What went wrong.
        reason: String,
    },
    /// Both the filtered traversal and its edge-list fallback failed.
    #[error("[GRAPH_TRAVERSAL] primary: {primary}; fallback: {fallback}")]
    Traversal {
        /// Failure of the filtered, store-side traversal.
        primary: Box<GraphError>,
        /// Failure of the filter-free edge-list traversal.
        fallback: Box<GraphError>,
    },
    /// The root node read back after creation does not carry the fixed id.
    #[error("[GRAPH_SINGLETON] expected root `{expected}`, store returned {found:?}")]
    SingletonViolation {
        /// The fixed root id.
        expected: String,
        /// Id found on re-read, if any record came back.
        found: Option<String>,
    },
    /// Attempt to write a key the graph layer manages itself.
    #[error("[GRAPH_PROTECTED] `{0}` is managed by the graph layer")]
    ProtectedField(String),
    /// Entity properties must serialize to a JSON object.
    #[error("[GRAPH_PROPERTIES] {0}")]
    InvalidProperties(String),
    /// A type filter did not follow the filter grammar.
    #[error("[GRAPH_FILTER] {0}")]
    InvalidFilter(String),
    /// JSON encoding or decoding failed.
    #[error("[GRAPH_SERDE] {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub(crate) fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Deserialization {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
