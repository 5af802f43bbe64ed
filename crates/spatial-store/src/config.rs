// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Adapter selection for the graph's backing store.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Database, JsonDatabase, MemoryDatabase, StoreError, StoreResult};

/// Environment variable naming the backend (`memory` or `json`).
pub const ENV_DB_TYPE: &str = "SPATIAL_DB_TYPE";
/// Environment variable naming the JSON store root directory.
pub const ENV_JSONDB_PATH: &str = "SPATIAL_JSONDB_PATH";
/// Root used by the JSON backend when none is configured.
pub const DEFAULT_JSONDB_PATH: &str = "spatial_db";

/// Which reference adapter to open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// [`MemoryDatabase`]; state dies with the process.
    #[default]
    Memory,
    /// [`JsonDatabase`] rooted at [`DatabaseConfig::json_path`].
    Json,
}

impl std::str::FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "json" | "jsondb" => Ok(Self::Json),
            other => Err(StoreError::Config(format!("unknown backend `{other}`"))),
        }
    }
}

/// Store selection, loadable from the environment or a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Adapter to open.
    pub backend: Backend,
    /// Root directory for the JSON backend.
    pub json_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            json_path: PathBuf::from(DEFAULT_JSONDB_PATH),
        }
    }
}

impl DatabaseConfig {
    /// Read [`ENV_DB_TYPE`] and [`ENV_JSONDB_PATH`]; unset values keep defaults.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_DB_TYPE).filter(|v| !v.trim().is_empty()) {
            config.backend = raw.parse()?;
        }
        if let Some(path) = lookup(ENV_JSONDB_PATH).filter(|v| !v.trim().is_empty()) {
            config.json_path = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Parse a JSON config document. Missing fields keep defaults.
    pub fn from_json_slice(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Open the configured adapter.
    pub fn open(&self) -> Arc<dyn Database> {
        match self.backend {
            Backend::Memory => Arc::new(MemoryDatabase::new()),
            Backend::Json => Arc::new(JsonDatabase::new(self.json_path.clone())),
        }
    }
}
