// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Traversal query builder and its translation into store filter documents.
//!
//! A type filter is written as one of:
//!
//! - a type name: `"City"`
//! - a list of names: `["City", "Town"]`
//! - a list of single-key maps: `[{"City": {"context.population": {"$gte": 50000}}}]`
//!
//! Names match the type and its registered descendants. Condition keys that
//! are already namespaced (`context.`) or are store-level keys (`id`, and
//! `source`/`target`/`direction` for edges) are used verbatim; bare keys are
//! treated as property names and namespaced for the target collection.

use serde_json::{json, Map, Value};

use crate::edge::Direction;
use crate::error::{GraphError, GraphResult};
use crate::kind::{descendants, TypeCode};

/// One type plus the conditions its records must meet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeCondition {
    /// Type name; matches registered descendants too.
    pub type_name: String,
    /// Field conditions in filter-document form.
    pub conditions: Map<String, Value>,
}

impl TypeCondition {
    /// Condition-free match on `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            conditions: Map::new(),
        }
    }

    /// Add a field condition (`value` may be a literal or operator document).
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.insert(field.into(), value);
        self
    }
}

/// Disjunction of [`TypeCondition`]s.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeFilter(pub Vec<TypeCondition>);

impl TypeFilter {
    /// Parse the JSON spelling of a type filter.
    pub fn from_value(value: &Value) -> GraphResult<Self> {
        match value {
            Value::String(name) => Ok(Self(vec![TypeCondition::new(name.clone())])),
            Value::Array(items) => items
                .iter()
                .map(parse_condition)
                .collect::<GraphResult<Vec<_>>>()
                .map(Self),
            other => Err(GraphError::InvalidFilter(format!(
                "type filter must be a name or a list, got {other}"
            ))),
        }
    }

    /// Filter document for records in collection `code`.
    pub fn to_document(&self, code: TypeCode) -> Value {
        let clauses: Vec<Value> = self
            .0
            .iter()
            .map(|cond| {
                let mut parts = vec![json!({ "name": { "$in": descendants(&cond.type_name) } })];
                if !cond.conditions.is_empty() {
                    parts.push(namespace_filter(code, &Value::Object(cond.conditions.clone())));
                }
                and_all(parts)
            })
            .collect();
        match clauses.len() {
            0 => json!({}),
            1 => clauses.into_iter().next().unwrap_or_else(|| json!({})),
            _ => json!({ "$or": clauses }),
        }
    }
}

fn parse_condition(item: &Value) -> GraphResult<TypeCondition> {
    match item {
        Value::String(name) => Ok(TypeCondition::new(name.clone())),
        Value::Object(map) if map.len() == 1 => {
            let Some((name, conditions)) = map.iter().next() else {
                return Err(GraphError::InvalidFilter("empty type mapping".into()));
            };
            match conditions {
                Value::Object(conditions) => Ok(TypeCondition {
                    type_name: name.clone(),
                    conditions: conditions.clone(),
                }),
                Value::Null => Ok(TypeCondition::new(name.clone())),
                other => Err(GraphError::InvalidFilter(format!(
                    "conditions for `{name}` must be an object, got {other}"
                ))),
            }
        }
        other => Err(GraphError::InvalidFilter(format!(
            "type filter entries must be names or single-key maps, got {other}"
        ))),
    }
}

impl From<&str> for TypeFilter {
    fn from(name: &str) -> Self {
        Self(vec![TypeCondition::new(name)])
    }
}

impl From<String> for TypeFilter {
    fn from(name: String) -> Self {
        Self(vec![TypeCondition::new(name)])
    }
}

impl From<Vec<&str>> for TypeFilter {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(TypeCondition::new).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TypeFilter {
    fn from(names: [&str; N]) -> Self {
        Self(names.into_iter().map(TypeCondition::new).collect())
    }
}

impl From<TypeCondition> for TypeFilter {
    fn from(cond: TypeCondition) -> Self {
        Self(vec![cond])
    }
}

impl From<Vec<TypeCondition>> for TypeFilter {
    fn from(conds: Vec<TypeCondition>) -> Self {
        Self(conds)
    }
}

/// Parameters of a node traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeQuery {
    /// Which incident edges to follow. Defaults to [`Direction::Out`].
    pub direction: Direction,
    /// Restriction on the connected nodes' types and fields.
    pub node_filter: Option<TypeFilter>,
    /// Restriction on the traversed edges' types and fields.
    pub edge_filter: Option<TypeFilter>,
    /// Maximum number of candidate nodes, applied before the node query.
    pub limit: Option<usize>,
    /// Equality filters on the connected nodes' properties.
    pub properties: Map<String, Value>,
}

impl NodeQuery {
    /// Outgoing traversal with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the direction.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Restrict connected node types.
    pub fn node(mut self, filter: impl Into<TypeFilter>) -> Self {
        self.node_filter = Some(filter.into());
        self
    }

    /// Restrict traversed edge types.
    pub fn edge(mut self, filter: impl Into<TypeFilter>) -> Self {
        self.edge_filter = Some(filter.into());
        self
    }

    /// Cap the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Require `key == value` on connected nodes.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

fn is_store_key(code: TypeCode, key: &str) -> bool {
    key == "id"
        || (code == TypeCode::Edge && matches!(key, "source" | "target" | "direction"))
}

/// Namespace a bare property key for collection `code`.
pub fn namespace_key(code: TypeCode, key: &str) -> String {
    if !code.namespaces_properties()
        || key.starts_with('$')
        || key.starts_with("context.")
        || is_store_key(code, key)
    {
        key.to_string()
    } else {
        format!("context.{key}")
    }
}

/// Rewrite every field key of `filter` through [`namespace_key`], descending
/// into `$and`/`$or`/`$nor`.
pub fn namespace_filter(code: TypeCode, filter: &Value) -> Value {
    let Value::Object(clauses) = filter else {
        return filter.clone();
    };
    let mut out = Map::with_capacity(clauses.len());
    for (key, value) in clauses {
        match (key.as_str(), value) {
            ("$and" | "$or" | "$nor", Value::Array(subs)) => {
                let subs = subs.iter().map(|sub| namespace_filter(code, sub)).collect();
                out.insert(key.clone(), Value::Array(subs));
            }
            _ => {
                out.insert(namespace_key(code, key), value.clone());
            }
        }
    }
    Value::Object(out)
}

/// Equality filter document for property map `properties`.
pub fn property_filter(code: TypeCode, properties: &Map<String, Value>) -> Value {
    let out: Map<String, Value> = properties
        .iter()
        .map(|(key, value)| (namespace_key(code, key), json!({ "$eq": value })))
        .collect();
    Value::Object(out)
}

/// Edges sourced at, targeting, or touching `node_id`, in either layout.
pub fn direction_clause(direction: Direction, node_id: &str) -> Value {
    let sourced = [json!({ "source": node_id }), json!({ "context.source": node_id })];
    let targeted = [json!({ "target": node_id }), json!({ "context.target": node_id })];
    let clauses: Vec<Value> = match direction {
        Direction::Out => sourced.into_iter().collect(),
        Direction::In => targeted.into_iter().collect(),
        Direction::Both => sourced.into_iter().chain(targeted).collect(),
    };
    json!({ "$or": clauses })
}

/// `{"id": {"$in": ids}}`.
pub fn id_in<S: AsRef<str>>(ids: &[S]) -> Value {
    let ids: Vec<Value> = ids.iter().map(|id| Value::from(id.as_ref())).collect();
    json!({ "id": { "$in": ids } })
}

fn is_trivial(doc: &Value) -> bool {
    doc.is_null() || doc.as_object().is_some_and(Map::is_empty)
}

/// Conjunction of `parts`, dropping empty documents.
pub fn and_all(parts: Vec<Value>) -> Value {
    let mut parts: Vec<Value> = parts.into_iter().filter(|p| !is_trivial(p)).collect();
    match parts.len() {
        0 => json!({}),
        1 => parts.pop().unwrap_or_else(|| json!({})),
        _ => json!({ "$and": parts }),
    }
}
