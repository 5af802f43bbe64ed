// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence orchestration: CRUD, typed reconstruction and filtered finds.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde_json::{Map, Value};
use spatial_store::{Database, DatabaseConfig, Record};
use tracing::{debug, instrument, warn};

use crate::edge::{Direction, Edge};
use crate::entity::{check_protected, generate_id, split_record, to_props, Entity, ObjectCore};
use crate::error::{GraphError, GraphResult};
use crate::kind::{register, resolve, Archetype, KindInfo, TypeCode};
use crate::node::Node;
use crate::query::{and_all, direction_clause, namespace_filter, property_filter, TypeFilter};
use crate::root::{Root, ROOT_ID, ROOT_NAME};

/// Handle on one backing store.
///
/// Cloning is cheap and every clone talks to the same store. The context
/// keeps no other state: no caching, no write buffering.
#[derive(Clone)]
pub struct GraphContext {
    db: Arc<dyn Database>,
}

impl std::fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphContext").finish_non_exhaustive()
    }
}

static DEFAULT_CONTEXT: LazyLock<RwLock<Option<GraphContext>>> =
    LazyLock::new(|| RwLock::new(None));

impl GraphContext {
    /// Wrap a store handle.
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Context over the adapter `config` selects.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.open())
    }

    /// The underlying store.
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// The process-wide default context, created from the environment on
    /// first use.
    pub fn default_context() -> GraphResult<Self> {
        if let Some(ctx) = DEFAULT_CONTEXT
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(ctx.clone());
        }
        let mut slot = DEFAULT_CONTEXT
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = slot.as_ref() {
            return Ok(ctx.clone());
        }
        let config = DatabaseConfig::from_env()?;
        debug!(?config, "initializing default graph context");
        let ctx = Self::from_config(&config);
        *slot = Some(ctx.clone());
        Ok(ctx)
    }

    /// Install `ctx` as the process-wide default.
    pub fn set_default(ctx: Self) {
        *DEFAULT_CONTEXT
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(ctx);
    }

    /// Drop the process-wide default; the next use re-initializes it.
    pub fn reset_default() {
        *DEFAULT_CONTEXT
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Rebuild an entity from a stored record, resolving its concrete type
    /// relative to `queried`.
    pub(crate) fn hydrate<E: Entity>(&self, queried: KindInfo, record: &Record) -> GraphResult<E> {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::corrupt("?", "record has no string id"))?;
        let stored = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(queried.name);
        let kind = resolve(stored, queried);
        if kind.code != E::CODE {
            return Err(GraphError::corrupt(
                id,
                format!("type `{}` is not stored as `{}`", kind.name, E::CODE),
            ));
        }
        let (props, data) = split_record(E::CODE, id, record)?;
        let mut core = ObjectCore::new(id.to_string(), kind, props);
        if kind.name != stored {
            debug!(
                id,
                stored,
                resolved = kind.name,
                "stored type not registered as a descendant"
            );
            core.name = stored.to_string();
        }
        core.data = data;
        core.context = Some(self.clone());
        let entity = E::from_core(core, record)?;
        kind.validate(entity.properties())
            .map_err(|err| GraphError::corrupt(id, err.to_string()))?;
        Ok(entity)
    }

    /// Hydrate every record, skipping the ones that do not reconstruct.
    pub(crate) fn hydrate_all<E: Entity>(&self, queried: KindInfo, records: &[Record]) -> Vec<E> {
        records
            .iter()
            .filter_map(|record| match self.hydrate::<E>(queried, record) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(%err, "skipping unreadable record");
                    None
                }
            })
            .collect()
    }

    /// Build, bind and persist a new entity of archetype `A`.
    #[instrument(skip_all, fields(kind = A::NAME))]
    pub async fn create<A: Archetype>(&self, value: A) -> GraphResult<A::Entity> {
        let id = generate_id(<A::Entity as Entity>::CODE, A::NAME);
        self.create_with_id(&id, value).await
    }

    /// Like [`create`](Self::create) with a caller-chosen id.
    ///
    /// The root archetype ignores `id` and resolves to the singleton.
    #[instrument(skip_all, fields(kind = A::NAME, id = id))]
    pub async fn create_with_id<A: Archetype>(&self, id: &str, value: A) -> GraphResult<A::Entity> {
        register::<A>();
        let kind = KindInfo::of::<A>();
        if kind.code == TypeCode::Node && kind.name == ROOT_NAME {
            let root = Root::get(self).await?;
            return self.hydrate(kind, &root.to_record());
        }
        let props = to_props(&value)?;
        check_protected(kind.code, &props)?;
        let mut core = ObjectCore::new(id.to_string(), kind, props);
        core.context = Some(self.clone());
        let mut entity = <A::Entity as Entity>::from_core(core, &Value::Null)?;
        self.save(&mut entity).await?;
        debug!(id = entity.id(), "created");
        Ok(entity)
    }

    /// Fetch `id` as archetype `A` (or a registered subtype of it).
    ///
    /// Missing and unreconstructable records both yield `Ok(None)`.
    #[instrument(skip(self), fields(kind = A::NAME))]
    pub async fn get<A: Archetype>(&self, id: &str) -> GraphResult<Option<A::Entity>> {
        register::<A>();
        let code = <A::Entity as Entity>::CODE;
        let Some(record) = self.db.get(code.collection(), id).await? else {
            return Ok(None);
        };
        match self.hydrate(KindInfo::of::<A>(), &record) {
            Ok(entity) => Ok(Some(entity)),
            Err(err) => {
                debug!(%err, "record present but not reconstructable");
                Ok(None)
            }
        }
    }

    /// Fetch any node by id.
    pub async fn get_node(&self, id: &str) -> GraphResult<Option<Node>> {
        self.get::<crate::kind::AnyNode>(id).await
    }

    /// Fetch any edge by id.
    pub async fn get_edge(&self, id: &str) -> GraphResult<Option<Edge>> {
        self.get::<crate::kind::AnyEdge>(id).await
    }

    /// Persist `entity` (create or replace) and bind it to this context.
    ///
    /// A root node saved under any id but the fixed one is corrected first.
    #[instrument(skip_all, fields(id = entity.id()))]
    pub async fn save<E: Entity>(&self, entity: &mut E) -> GraphResult<()> {
        if E::CODE == TypeCode::Node && entity.type_name() == ROOT_NAME && entity.id() != ROOT_ID {
            warn!(id = entity.id(), "root saved under a foreign id; correcting");
            entity.core_mut().id = ROOT_ID.to_string();
        }
        entity.bind(self.clone());
        self.db
            .save(E::CODE.collection(), entity.to_record())
            .await?;
        Ok(())
    }

    /// Records of archetype `A` (and its registered subtypes) matching
    /// `query`, at most `limit` of them. Bare keys in `query` are property
    /// names.
    #[instrument(skip(self, query), fields(kind = A::NAME))]
    pub async fn find<A: Archetype>(
        &self,
        query: &Value,
        limit: Option<usize>,
    ) -> GraphResult<Vec<A::Entity>> {
        register::<A>();
        let code = <A::Entity as Entity>::CODE;
        let filter = Self::typed_filter::<A>(query);
        let records = self.db.find(code.collection(), &filter).await?;
        let mut out = self.hydrate_all::<A::Entity>(KindInfo::of::<A>(), &records);
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    /// Number of records [`find`](Self::find) would consider.
    pub async fn count<A: Archetype>(&self, query: &Value) -> GraphResult<usize> {
        register::<A>();
        let code = <A::Entity as Entity>::CODE;
        let filter = Self::typed_filter::<A>(query);
        Ok(self.db.count(code.collection(), &filter).await?)
    }

    fn typed_filter<A: Archetype>(query: &Value) -> Value {
        let code = <A::Entity as Entity>::CODE;
        let mut parts = vec![namespace_filter(code, query)];
        if A::NAME != <A::Entity as Entity>::BASE {
            parts.push(TypeFilter::from(A::NAME).to_document(code));
        }
        and_all(parts)
    }

    /// Edges from `source` (optionally to `target`), optionally restricted to
    /// `edge_type` and property equality filters.
    #[instrument(skip(self, properties))]
    pub async fn find_edges_between(
        &self,
        source: &str,
        target: Option<&str>,
        edge_type: Option<&str>,
        properties: &Map<String, Value>,
    ) -> GraphResult<Vec<Edge>> {
        let code = TypeCode::Edge;
        let mut parts = vec![direction_clause(Direction::Out, source)];
        if let Some(target) = target {
            parts.push(direction_clause(Direction::In, target));
        }
        if let Some(edge_type) = edge_type {
            parts.push(TypeFilter::from(edge_type).to_document(code));
        }
        parts.push(property_filter(code, properties));
        let records = self.db.find(code.collection(), &and_all(parts)).await?;
        Ok(self.hydrate_all(KindInfo::of::<crate::kind::AnyEdge>(), &records))
    }

    /// Create an edge of archetype `A` from `from` to `to` and record it on
    /// both nodes. Saves the edge, then both nodes.
    #[instrument(skip_all, fields(kind = A::NAME, from = from.id(), to = to.id()))]
    pub async fn connect<A>(
        &self,
        from: &mut Node,
        to: &mut Node,
        value: A,
        direction: Direction,
    ) -> GraphResult<Edge>
    where
        A: Archetype<Entity = Edge>,
    {
        register::<A>();
        let kind = KindInfo::of::<A>();
        let props = to_props(&value)?;
        check_protected(TypeCode::Edge, &props)?;
        let core = ObjectCore::new(generate_id(TypeCode::Edge, A::NAME), kind, props);
        let mut edge = Edge::from_core(core, &Value::Null)?;
        edge.set_endpoints(from.id(), to.id(), direction);
        self.save(&mut edge).await?;

        from.add_edge_id(edge.id());
        to.add_edge_id(edge.id());
        self.save(from).await?;
        self.save(to).await?;
        Ok(edge)
    }

    /// Remove every edge between `a` and `b` (either direction), optionally
    /// only those matching `edge_filter`. Both nodes are saved. Returns the
    /// number of edges removed.
    #[instrument(skip_all, fields(a = a.id(), b = b.id()))]
    pub async fn disconnect(
        &self,
        a: &mut Node,
        b: &mut Node,
        edge_filter: Option<&TypeFilter>,
    ) -> GraphResult<usize> {
        let shared: Vec<String> = a
            .edge_ids()
            .iter()
            .filter(|id| b.edge_ids().contains(id))
            .cloned()
            .collect();
        if shared.is_empty() {
            return Ok(0);
        }
        let mut parts = vec![crate::query::id_in(&shared)];
        if let Some(filter) = edge_filter {
            parts.push(filter.to_document(TypeCode::Edge));
        }
        let records = self
            .db
            .find(TypeCode::Edge.collection(), &and_all(parts))
            .await?;
        let edges: Vec<Edge> = self.hydrate_all(KindInfo::of::<crate::kind::AnyEdge>(), &records);
        let doomed: Vec<String> = edges
            .iter()
            .filter(|e| e.touches(a.id()) && e.touches(b.id()))
            .map(|e| e.id().to_string())
            .collect();

        let mut removed = 0;
        for edge_id in &doomed {
            self.db.delete(TypeCode::Edge.collection(), edge_id).await?;
            a.remove_edge_id(edge_id);
            b.remove_edge_id(edge_id);
            removed += 1;
        }
        if removed > 0 {
            self.save(a).await?;
            self.save(b).await?;
        }
        Ok(removed)
    }
}

/// Shorthand for [`GraphContext::default_context`].
pub fn default_context() -> GraphResult<GraphContext> {
    GraphContext::default_context()
}

/// Shorthand for [`GraphContext::set_default`].
pub fn set_default_context(ctx: GraphContext) {
    GraphContext::set_default(ctx);
}

/// Shorthand for [`GraphContext::reset_default`].
pub fn reset_default_context() {
    GraphContext::reset_default();
}
