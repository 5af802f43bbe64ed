// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Edges: persisted connections between two node ids.
//!
//! Edge records are written in the canonical layout, with `source`, `target`
//! and `direction` at the top level. Older records nested those keys inside
//! `context`; [`normalize_endpoints`] is the single read path that accepts
//! both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spatial_store::Record;

use crate::entity::{Entity, ObjectCore};
use crate::error::{GraphError, GraphResult};
use crate::kind::TypeCode;

/// Traversal direction, and the direction indicator stored on edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From source to target.
    #[default]
    Out,
    /// From target to source.
    In,
    /// Either way.
    Both,
}

impl Direction {
    /// Wire spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::In => "in",
            Self::Both => "both",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "out" => Ok(Self::Out),
            "in" => Ok(Self::In),
            "both" => Ok(Self::Both),
            other => Err(GraphError::InvalidFilter(format!(
                "unknown direction `{other}`"
            ))),
        }
    }
}

/// Endpoints and direction read from either record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Stored direction indicator.
    pub direction: Direction,
}

/// Read endpoints from a stored edge record, preferring the top-level layout
/// and falling back to the legacy nested one. Legacy keys are stripped from
/// `props` so they never round-trip as properties.
pub fn normalize_endpoints(
    id: &str,
    record: &Record,
    props: &mut Map<String, Value>,
) -> GraphResult<Endpoints> {
    let nested_source = props.remove("source");
    let nested_target = props.remove("target");
    let nested_direction = props.remove("direction");

    let pick = |key: &str, nested: Option<Value>| -> Option<Value> {
        record
            .get(key)
            .filter(|v| !v.is_null())
            .cloned()
            .or(nested)
    };

    let source = pick("source", nested_source);
    let target = pick("target", nested_target);
    let direction = pick("direction", nested_direction);

    let as_id = |field: &str, value: Option<Value>| -> GraphResult<String> {
        match value {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(GraphError::corrupt(
                id,
                format!("edge `{field}` is not a string: {other}"),
            )),
        }
    };

    let direction = match direction {
        None | Some(Value::Null) => Direction::Both,
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| GraphError::corrupt(id, format!("edge direction `{s}` is unknown")))?,
        Some(Value::Bool(bidirectional)) => {
            if bidirectional {
                Direction::Both
            } else {
                Direction::Out
            }
        }
        Some(other) => {
            return Err(GraphError::corrupt(
                id,
                format!("edge direction is not a string: {other}"),
            ))
        }
    };

    Ok(Endpoints {
        source: as_id("source", source)?,
        target: as_id("target", target)?,
        direction,
    })
}

/// A persisted edge (type code `e`).
#[derive(Debug, Clone)]
pub struct Edge {
    core: ObjectCore,
    source: String,
    target: String,
    direction: Direction,
}

impl Edge {
    /// Source node id (empty for a dangling edge).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Target node id (empty for a dangling edge).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Stored direction indicator.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn set_endpoints(&mut self, source: &str, target: &str, direction: Direction) {
        self.source = source.to_string();
        self.target = target.to_string();
        self.direction = direction;
    }

    /// `true` if `node_id` is either endpoint.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// The endpoint opposite `node_id`, if `node_id` is an endpoint.
    pub fn other(&self, node_id: &str) -> Option<&str> {
        if self.source == node_id {
            Some(&self.target)
        } else if self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }

    /// The node reached from `node_id` when walking in `direction`.
    pub fn far_end(&self, node_id: &str, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Out => (self.source == node_id).then_some(self.target.as_str()),
            Direction::In => (self.target == node_id).then_some(self.source.as_str()),
            Direction::Both => self.other(node_id),
        }
    }

    /// Persist through the bound (or default) context.
    pub async fn save(&mut self) -> crate::GraphResult<()> {
        let ctx = self.resolve_context()?;
        ctx.save(self).await
    }

    /// Delete the edge record through the bound (or default) context.
    pub async fn delete(&self) -> crate::GraphResult<()> {
        let ctx = self.resolve_context()?;
        ctx.delete(self, false).await
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.core.id == other.core.id
    }
}

impl Entity for Edge {
    const CODE: TypeCode = TypeCode::Edge;
    const BASE: &'static str = "Edge";

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn from_core(mut core: ObjectCore, record: &Record) -> GraphResult<Self> {
        let endpoints = normalize_endpoints(&core.id, record, &mut core.props)?;
        Ok(Self {
            core,
            source: endpoints.source,
            target: endpoints.target,
            direction: endpoints.direction,
        })
    }

    fn to_record(&self) -> Record {
        let mut record = Map::new();
        record.insert("id".into(), Value::String(self.core.id.clone()));
        record.insert("name".into(), Value::String(self.core.name.clone()));
        record.insert("context".into(), Value::Object(self.core.exported_context()));
        record.insert("source".into(), Value::String(self.source.clone()));
        record.insert("target".into(), Value::String(self.target.clone()));
        record.insert(
            "direction".into(),
            Value::String(self.direction.as_str().to_string()),
        );
        Value::Object(record)
    }
}
