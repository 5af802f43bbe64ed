// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Type codes, archetypes and the type registry.
//!
//! Every persisted entity carries a type name (`"City"`, `"Highway"`) next to
//! its id. Reading a record back resolves that name through the registry so a
//! lookup for a base type yields the concrete registered subtype. Names the
//! registry has never seen fall back to the queried type for reconstruction,
//! but the entity keeps its stored name.
//!
//! Archetypes enter the registry when they are declared with
//! [`register_archetype!`](crate::register_archetype), or lazily the first
//! time a context creates, reads or queries them.

use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::entity::Entity;
use crate::{Edge, Node, Object, Root};

/// Single-character collection discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    /// `"n"`, stored in `node`.
    #[serde(rename = "n")]
    Node,
    /// `"e"`, stored in `edge`.
    #[serde(rename = "e")]
    Edge,
    /// `"o"`, stored in `object`.
    #[serde(rename = "o")]
    Object,
    /// `"w"`, stored in `walker`.
    #[serde(rename = "w")]
    Walker,
}

impl TypeCode {
    /// The one-letter code used as the id prefix.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Node => "n",
            Self::Edge => "e",
            Self::Object => "o",
            Self::Walker => "w",
        }
    }

    /// Name of the store collection holding this kind of record.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Object => "object",
            Self::Walker => "walker",
        }
    }

    /// Parse a one-letter code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "n" => Some(Self::Node),
            "e" => Some(Self::Edge),
            "o" => Some(Self::Object),
            "w" => Some(Self::Walker),
            _ => None,
        }
    }

    /// Whether property keys live under `context.` in stored records.
    pub const fn namespaces_properties(self) -> bool {
        !matches!(self, Self::Object)
    }
}

impl std::fmt::Display for TypeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A user-defined entity type.
///
/// The struct's serde representation is the entity's property map. Fields
/// listed in [`TRANSIENT`](Archetype::TRANSIENT) stay in memory but are never
/// persisted, so they must tolerate absence on read (`#[serde(default)]`).
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use spatial_graph::{Archetype, Node};
///
/// #[derive(Serialize, Deserialize)]
/// struct City {
///     population: u64,
/// }
///
/// impl Archetype for City {
///     const NAME: &'static str = "City";
///     type Entity = Node;
/// }
/// ```
pub trait Archetype: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stored type name. Must be unique across the process.
    const NAME: &'static str;
    /// Registered parent type; `None` means the entity base (`Node`, `Edge`,
    /// `Object`).
    const PARENT: Option<&'static str> = None;
    /// Property names excluded from the persisted representation.
    const TRANSIENT: &'static [&'static str] = &[];
    /// Entity shape this archetype is stored as.
    type Entity: Entity;
}

type Validator = fn(&Map<String, Value>) -> Result<(), serde_json::Error>;

/// Registry entry describing one archetype.
#[derive(Clone, Copy)]
pub struct KindInfo {
    /// Stored type name.
    pub name: &'static str,
    /// Collection discriminator.
    pub code: TypeCode,
    /// Parent type name (`None` only for the entity bases).
    pub parent: Option<&'static str>,
    /// Name of the entity base this type is stored as.
    pub base: &'static str,
    /// Property names excluded from exports.
    pub transient: &'static [&'static str],
    validate: Validator,
}

impl std::fmt::Debug for KindInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindInfo")
            .field("name", &self.name)
            .field("code", &self.code)
            .field("parent", &self.parent)
            .field("base", &self.base)
            .field("transient", &self.transient)
            .finish_non_exhaustive()
    }
}

fn validate_as<A: Archetype>(props: &Map<String, Value>) -> Result<(), serde_json::Error> {
    serde_json::from_value::<A>(Value::Object(props.clone())).map(drop)
}

impl KindInfo {
    /// Describe archetype `A`.
    pub fn of<A: Archetype>() -> Self {
        let base = <A::Entity as Entity>::BASE;
        let parent = A::PARENT.or(if A::NAME == base { None } else { Some(base) });
        Self {
            name: A::NAME,
            code: <A::Entity as Entity>::CODE,
            parent,
            base,
            transient: A::TRANSIENT,
            validate: validate_as::<A>,
        }
    }

    /// Check that `props` can be read as this archetype.
    pub fn validate(&self, props: &Map<String, Value>) -> Result<(), serde_json::Error> {
        (self.validate)(props)
    }
}

/// Link-time registry entry produced by [`register_archetype!`](crate::register_archetype).
#[doc(hidden)]
pub struct KindRegistration {
    describe: fn() -> KindInfo,
}

impl KindRegistration {
    /// Wrap a descriptor constructor.
    pub const fn new(describe: fn() -> KindInfo) -> Self {
        Self { describe }
    }
}

inventory::collect!(KindRegistration);

/// Register archetypes at program start.
///
/// Records whose stored type name belongs to a declared archetype resolve to
/// it even before any context has touched the type, and type filters see it
/// as a descendant of its parents.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use spatial_graph::{register_archetype, Archetype, Node};
///
/// #[derive(Serialize, Deserialize)]
/// struct Town {
///     population: u64,
/// }
///
/// impl Archetype for Town {
///     const NAME: &'static str = "Town";
///     type Entity = Node;
/// }
///
/// register_archetype!(Town);
///
/// assert!(spatial_graph::lookup("Town").is_some());
/// ```
#[macro_export]
macro_rules! register_archetype {
    ($($ty:ty),+ $(,)?) => {
        $(
            $crate::__private::inventory::submit! {
                $crate::__private::KindRegistration::new($crate::KindInfo::of::<$ty>)
            }
        )+
    };
}

/// Property map of a plain node with no declared schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnyNode(pub Map<String, Value>);

impl Archetype for AnyNode {
    const NAME: &'static str = "Node";
    type Entity = Node;
}

/// Property map of a plain edge with no declared schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnyEdge(pub Map<String, Value>);

impl Archetype for AnyEdge {
    const NAME: &'static str = "Edge";
    type Entity = Edge;
}

/// Property map of a plain object with no declared schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnyObject(pub Map<String, Value>);

impl Archetype for AnyObject {
    const NAME: &'static str = "Object";
    type Entity = Object;
}

static REGISTRY: LazyLock<RwLock<HashMap<&'static str, KindInfo>>> = LazyLock::new(|| {
    let mut kinds = HashMap::new();
    for info in [
        KindInfo::of::<AnyNode>(),
        KindInfo::of::<AnyEdge>(),
        KindInfo::of::<AnyObject>(),
        KindInfo::of::<Root>(),
    ] {
        kinds.insert(info.name, info);
    }
    for registration in inventory::iter::<KindRegistration> {
        let info = (registration.describe)();
        kinds.insert(info.name, info);
    }
    RwLock::new(kinds)
});

/// Make archetype `A` resolvable by name. Idempotent.
///
/// Contexts register the archetypes they create, read or query; types
/// declared with [`register_archetype!`](crate::register_archetype) are
/// present from the start.
pub fn register<A: Archetype>() {
    let info = KindInfo::of::<A>();
    let mut kinds = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = kinds.get(info.name) {
        if existing.code != info.code || existing.parent != info.parent {
            warn!(
                name = info.name,
                "type re-registered with a different shape; last registration wins"
            );
        }
    }
    kinds.insert(info.name, info);
}

/// Look up a registered type by name.
pub fn lookup(name: &str) -> Option<KindInfo> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .copied()
}

/// `true` when `name` is `ancestor` or inherits from it.
///
/// A parent the registry has never seen still sits below the entity base of
/// its registered child, so the chain continues at that base.
pub fn is_a(name: &str, ancestor: &str) -> bool {
    let kinds = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    chain_contains(&kinds, name, ancestor)
}

fn chain_contains(kinds: &HashMap<&'static str, KindInfo>, name: &str, ancestor: &str) -> bool {
    let mut current = name;
    let mut base: Option<&str> = None;
    // Bounded walk; a malformed parent cycle must not hang a lookup.
    for _ in 0..kinds.len() + 2 {
        if current == ancestor {
            return true;
        }
        match kinds.get(current) {
            Some(info) => {
                base = Some(info.base);
                match info.parent {
                    Some(parent) => current = parent,
                    None => return false,
                }
            }
            None => match base.take() {
                Some(b) if b != current => current = b,
                _ => return false,
            },
        }
    }
    false
}

/// `name` plus every registered type inheriting from it, sorted.
pub fn descendants(name: &str) -> Vec<String> {
    let kinds = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    let mut out: Vec<String> = kinds
        .keys()
        .filter(|candidate| **candidate != name && chain_contains(&kinds, candidate, name))
        .map(|candidate| (*candidate).to_string())
        .collect();
    out.sort();
    out.insert(0, name.to_string());
    out
}

/// Pick the concrete type for a record stored as `stored` and queried as
/// `queried`: the stored type when it is a registered descendant of the
/// queried one, the queried type otherwise.
pub fn resolve(stored: &str, queried: KindInfo) -> KindInfo {
    if stored == queried.name {
        return lookup(stored).unwrap_or(queried);
    }
    match lookup(stored) {
        Some(info) if info.code == queried.code && is_a(stored, queried.name) => info,
        _ => queried,
    }
}
