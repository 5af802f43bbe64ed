// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The root node: the one node every store has, at a fixed id.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::context::GraphContext;
use crate::entity::{Entity, ObjectCore};
use crate::error::{GraphError, GraphResult};
use crate::kind::{Archetype, KindInfo, TypeCode};
use crate::node::Node;

/// Id of the root node in every store.
pub const ROOT_ID: &str = "n:Root:root";

/// Type name of the root node.
pub const ROOT_NAME: &str = "Root";

// Serializes get-or-create across every context in the process.
static ROOT_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Archetype of the root node. It declares no properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {}

impl Archetype for Root {
    const NAME: &'static str = ROOT_NAME;
    const PARENT: Option<&'static str> = Some("Node");
    type Entity = Node;
}

impl Root {
    /// Fetch the root node of `ctx`'s store, creating it on first use.
    ///
    /// Concurrent callers observe exactly one creation. After creating, the
    /// record is read back; an id other than [`ROOT_ID`] is reported as
    /// [`GraphError::SingletonViolation`]. An existing root record that cannot
    /// be reconstructed is an error, never silently replaced.
    #[instrument(skip_all)]
    pub async fn get(ctx: &GraphContext) -> GraphResult<Node> {
        let _guard = ROOT_LOCK.lock().await;
        let collection = TypeCode::Node.collection();
        if let Some(record) = ctx.database().get(collection, ROOT_ID).await? {
            return ctx.hydrate(KindInfo::of::<Self>(), &record);
        }

        debug!("creating root node");
        let core = ObjectCore::new(ROOT_ID.to_string(), KindInfo::of::<Self>(), Map::new());
        let mut root = Node::from_core(core, &Value::Null)?;
        ctx.save(&mut root).await?;

        let found = ctx
            .database()
            .get(collection, ROOT_ID)
            .await?
            .and_then(|record| record.get("id").and_then(Value::as_str).map(str::to_string));
        if found.as_deref() != Some(ROOT_ID) {
            return Err(GraphError::SingletonViolation {
                expected: ROOT_ID.to_string(),
                found,
            });
        }
        Ok(root)
    }
}
