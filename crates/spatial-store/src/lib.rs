// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collection-oriented document store contract for the spatial graph.
//!
//! `spatial-store` provides the [`Database`] trait consumed by the graph layer:
//! five operations (`get`, `find`, `save`, `delete`, `count`) over named
//! collections of JSON records keyed by their `"id"` field. Two reference
//! adapters ship with the crate: [`MemoryDatabase`] (in-process) and
//! [`JsonDatabase`] (one file per record). Production backends live outside
//! this workspace and only need to honour the contract below.
//!
//! # Filter Documents
//!
//! `find` and `count` take a Mongo-style filter document. [`filter::matches`]
//! is the reference evaluator: `$and`/`$or`/`$nor` at any level, dotted field
//! paths, and the per-field operators `$eq $ne $gt $gte $lt $lte $in $nin
//! $regex $exists $not`. Adapters that push filters into a native query
//! language must agree with it.
//!
//! # Absence Semantics
//!
//! [`Database::get`] returns `Ok(None)` for a missing record and
//! [`Database::delete`] of a missing record is a no-op. Errors are reserved for
//! I/O, malformed records and malformed queries.
#![forbid(unsafe_code)]

pub mod config;
pub mod filter;
mod json;
mod memory;

pub use config::{Backend, DatabaseConfig};
pub use json::JsonDatabase;
pub use memory::MemoryDatabase;

use async_trait::async_trait;
use serde_json::Value;

/// A stored document. Always a JSON object carrying a string `"id"`.
pub type Record = Value;

/// Errors raised by a backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure in a file-backed adapter.
    #[error("[STORE_IO] {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be encoded or decoded.
    #[error("[STORE_SERDE] {0}")]
    Serde(#[from] serde_json::Error),
    /// The filter document is malformed (unknown operator, bad operand).
    #[error("[STORE_INVALID_QUERY] {0}")]
    InvalidQuery(String),
    /// A record handed to `save` had no string `"id"` field.
    #[error("[STORE_MISSING_ID] record saved to `{collection}` has no string id")]
    MissingId {
        /// Collection the record was destined for.
        collection: String,
    },
    /// The backend refused or could not service the request.
    #[error("[STORE_UNAVAILABLE] {0}")]
    Unavailable(String),
    /// Adapter selection failed.
    #[error("[STORE_CONFIG] {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store over named collections.
///
/// Implementations must be safe to share between tasks; every call is an
/// `.await` point and no cross-call atomicity is promised.
#[async_trait]
pub trait Database: Send + Sync {
    /// Fetch one record by id. `Ok(None)` when absent.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>>;

    /// Return every record in `collection` matching `filter`.
    ///
    /// An empty object (or `null`) matches everything.
    async fn find(&self, collection: &str, filter: &Value) -> StoreResult<Vec<Record>>;

    /// Create or replace a record under its `"id"`.
    async fn save(&self, collection: &str, record: Record) -> StoreResult<()>;

    /// Remove a record. Missing ids are a no-op.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Count records in `collection` matching `filter`.
    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<usize>;
}

/// Extract the string id of a record destined for `collection`.
pub fn record_id<'a>(collection: &str, record: &'a Record) -> StoreResult<&'a str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::MissingId {
            collection: collection.to_string(),
        })
}
