// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entity base: identity, type name, property map, scratch storage and the
//! export contract shared by objects, nodes and edges.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use spatial_store::Record;
use uuid::Uuid;

use crate::context::GraphContext;
use crate::error::{GraphError, GraphResult};
use crate::kind::{Archetype, KindInfo, TypeCode};

/// Key of the scratch blob inside stored property maps.
pub const DATA_KEY: &str = "_data";

/// Generate `"{code}:{TypeName}:{uuid}"`.
pub fn generate_id(code: TypeCode, type_name: &str) -> String {
    format!("{}:{}:{}", code.code(), type_name, Uuid::new_v4().simple())
}

/// State every entity carries.
#[derive(Clone)]
pub struct ObjectCore {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) kind: KindInfo,
    pub(crate) props: Map<String, Value>,
    pub(crate) data: Map<String, Value>,
    pub(crate) context: Option<GraphContext>,
}

impl std::fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCore")
            .field("id", &self.id)
            .field("type", &self.name)
            .field("props", &self.props)
            .field("data", &self.data)
            .field("bound", &self.context.is_some())
            .finish()
    }
}

impl ObjectCore {
    pub(crate) fn new(id: String, kind: KindInfo, props: Map<String, Value>) -> Self {
        Self {
            id,
            name: kind.name.to_string(),
            kind,
            props,
            data: Map::new(),
            context: None,
        }
    }

    /// Properties minus transient fields.
    pub(crate) fn exported_props(&self) -> Map<String, Value> {
        self.props
            .iter()
            .filter(|(key, _)| !self.kind.transient.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Exported properties with the scratch blob folded in when non-empty.
    pub(crate) fn exported_context(&self) -> Map<String, Value> {
        let mut ctx = self.exported_props();
        if !self.data.is_empty() {
            ctx.insert(DATA_KEY.to_string(), Value::Object(self.data.clone()));
        }
        ctx
    }
}

/// Keys callers may not write as properties, per collection.
pub(crate) fn protected_keys(code: TypeCode) -> &'static [&'static str] {
    match code {
        TypeCode::Object => &["id", "name", DATA_KEY],
        TypeCode::Edge => &["id", "source", "target", "direction", DATA_KEY],
        TypeCode::Node | TypeCode::Walker => &["id", DATA_KEY],
    }
}

/// Serialize an archetype value into a property map.
pub(crate) fn to_props<A: Serialize>(value: &A) -> GraphResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(GraphError::InvalidProperties(format!(
            "archetype must serialize to an object, got {other}"
        ))),
    }
}

pub(crate) fn check_protected(code: TypeCode, props: &Map<String, Value>) -> GraphResult<()> {
    match protected_keys(code).iter().find(|key| props.contains_key(**key)) {
        Some(key) => Err(GraphError::ProtectedField((*key).to_string())),
        None => Ok(()),
    }
}

/// Pull `(props, scratch)` out of a stored record for collection `code`.
pub(crate) fn split_record(
    code: TypeCode,
    id: &str,
    record: &Record,
) -> GraphResult<(Map<String, Value>, Map<String, Value>)> {
    let mut props = if code.namespaces_properties() {
        match record.get("context") {
            Some(Value::Object(map)) => map.clone(),
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                return Err(GraphError::corrupt(
                    id,
                    format!("`context` is not an object: {other}"),
                ))
            }
        }
    } else {
        let mut map = record.as_object().cloned().unwrap_or_default();
        map.remove("id");
        map.remove("name");
        map
    };
    let data = match props.remove(DATA_KEY) {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            return Err(GraphError::corrupt(
                id,
                format!("`{DATA_KEY}` is not an object: {other}"),
            ))
        }
    };
    Ok((props, data))
}

/// A persistable entity shape.
///
/// Implemented by [`Object`], [`Node`](crate::Node) and [`Edge`](crate::Edge).
/// The provided methods form the entity-level API: identity, properties,
/// typed views and scratch storage.
pub trait Entity: Clone + Send + Sync + Sized + 'static {
    /// Collection discriminator for this shape.
    const CODE: TypeCode;
    /// Type name of the untyped base archetype.
    const BASE: &'static str;

    #[doc(hidden)]
    fn core(&self) -> &ObjectCore;
    #[doc(hidden)]
    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Finish construction from a core plus the stored record (`Value::Null`
    /// for fresh entities).
    fn from_core(core: ObjectCore, record: &Record) -> GraphResult<Self>;

    /// Stored representation (transient fields excluded).
    fn to_record(&self) -> Record;

    /// Incident edge ids; empty for anything but nodes.
    fn edge_ids(&self) -> &[String] {
        &[]
    }

    /// Unique id, fixed at construction.
    fn id(&self) -> &str {
        &self.core().id
    }

    /// Stored type name. Matches [`kind`](Entity::kind) unless the record
    /// names a type this process has not registered.
    fn type_name(&self) -> &str {
        &self.core().name
    }

    /// Collection discriminator.
    fn type_code(&self) -> TypeCode {
        Self::CODE
    }

    /// Registry entry the entity was reconstructed as.
    fn kind(&self) -> KindInfo {
        self.core().kind
    }

    /// Context this entity is bound to.
    fn context(&self) -> Option<&GraphContext> {
        self.core().context.as_ref()
    }

    /// Rebind to another context.
    fn bind(&mut self, context: GraphContext) {
        self.core_mut().context = Some(context);
    }

    /// Bound context, or the process default.
    fn resolve_context(&self) -> GraphResult<GraphContext> {
        match self.context() {
            Some(ctx) => Ok(ctx.clone()),
            None => GraphContext::default_context(),
        }
    }

    /// Every in-memory property, transient ones included.
    fn properties(&self) -> &Map<String, Value> {
        &self.core().props
    }

    /// Read one property.
    fn get(&self, key: &str) -> Option<&Value> {
        self.core().props.get(key)
    }

    /// Write one property. Call `save` to persist.
    fn set(&mut self, key: &str, value: impl Serialize) -> GraphResult<()> {
        if protected_keys(Self::CODE).contains(&key) {
            return Err(GraphError::ProtectedField(key.to_string()));
        }
        let value = serde_json::to_value(value)?;
        self.core_mut().props.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove one property, returning its previous value.
    fn unset(&mut self, key: &str) -> Option<Value> {
        self.core_mut().props.remove(key)
    }

    /// Persisted property map (the export contract).
    fn export(&self) -> Map<String, Value> {
        self.core().exported_props()
    }

    /// Read the properties as archetype `A`.
    fn decode<A: DeserializeOwned>(&self) -> GraphResult<A> {
        Ok(serde_json::from_value(Value::Object(self.core().props.clone()))?)
    }

    /// Replace the properties with `value`'s fields.
    fn update<A: Archetype>(&mut self, value: &A) -> GraphResult<()> {
        let props = to_props(value)?;
        check_protected(Self::CODE, &props)?;
        self.core_mut().props = props;
        Ok(())
    }

    /// Scratch storage: persisted alongside properties, never validated.
    fn data(&self, key: &str) -> Option<&Value> {
        self.core().data.get(key)
    }

    /// Write a scratch value.
    fn set_data(&mut self, key: &str, value: impl Serialize) -> GraphResult<()> {
        let value = serde_json::to_value(value)?;
        self.core_mut().data.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a scratch value.
    fn remove_data(&mut self, key: &str) -> Option<Value> {
        self.core_mut().data.remove(key)
    }
}

/// A generic persisted object (type code `o`), stored flat.
#[derive(Debug, Clone)]
pub struct Object {
    core: ObjectCore,
}

impl Object {
    /// Persist through the bound (or default) context.
    pub async fn save(&mut self) -> GraphResult<()> {
        let ctx = self.resolve_context()?;
        ctx.save(self).await
    }

    /// Delete through the bound (or default) context.
    pub async fn delete(&self) -> GraphResult<()> {
        let ctx = self.resolve_context()?;
        ctx.delete(self, false).await
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.core.id == other.core.id
    }
}

impl Entity for Object {
    const CODE: TypeCode = TypeCode::Object;
    const BASE: &'static str = "Object";

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn from_core(core: ObjectCore, _record: &Record) -> GraphResult<Self> {
        Ok(Self { core })
    }

    fn to_record(&self) -> Record {
        let mut record = self.core.exported_context();
        record.insert("id".into(), Value::String(self.core.id.clone()));
        record.insert("name".into(), Value::String(self.core.name.clone()));
        Value::Object(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kind::AnyObject;
    use serde_json::json;

    fn object(props: Value) -> Object {
        let Value::Object(props) = props else {
            unreachable!("test props are objects")
        };
        let core = ObjectCore::new("o:Object:1".into(), KindInfo::of::<AnyObject>(), props);
        Object::from_core(core, &Value::Null).unwrap()
    }

    #[test]
    fn generated_ids_carry_code_and_type() {
        let id = generate_id(TypeCode::Node, "City");
        assert!(id.starts_with("n:City:"));
        assert_eq!(id.len(), "n:City:".len() + 32);
        assert_ne!(id, generate_id(TypeCode::Node, "City"));
    }

    #[test]
    fn object_records_are_flat_with_scratch_blob() {
        let mut obj = object(json!({"title": "memo"}));
        obj.set_data("cursor", 3).unwrap();
        let record = obj.to_record();
        assert_eq!(record["id"], "o:Object:1");
        assert_eq!(record["name"], "Object");
        assert_eq!(record["title"], "memo");
        assert_eq!(record[DATA_KEY]["cursor"], 3);
    }

    #[test]
    fn split_record_round_trips_flat_objects() {
        let record = json!({"id": "o:1", "name": "Object", "title": "memo", "_data": {"k": 1}});
        let (props, data) = split_record(TypeCode::Object, "o:1", &record).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["title"], "memo");
        assert_eq!(data["k"], 1);
    }

    #[test]
    fn split_record_rejects_non_object_context() {
        let record = json!({"id": "n:1", "name": "Node", "context": [1, 2]});
        assert!(split_record(TypeCode::Node, "n:1", &record).is_err());
    }

    #[test]
    fn protected_keys_cannot_be_set() {
        let mut obj = object(json!({}));
        assert!(matches!(
            obj.set("id", "other"),
            Err(GraphError::ProtectedField(key)) if key == "id"
        ));
        assert!(obj.set("title", "ok").is_ok());
        assert_eq!(obj.get("title"), Some(&json!("ok")));
        assert_eq!(obj.unset("title"), Some(json!("ok")));
    }

    #[test]
    fn scalar_archetypes_are_rejected() {
        assert!(matches!(
            to_props(&5),
            Err(GraphError::InvalidProperties(_))
        ));
        assert!(to_props(&()).unwrap().is_empty());
    }
}
