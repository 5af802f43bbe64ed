// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! File-backed document store: one pretty-printed JSON file per record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::warn;

use crate::filter::matches;
use crate::{record_id, Database, Record, StoreError, StoreResult};

/// Store records as `<root>/<collection>/<escaped id>.json`.
///
/// Ids are escaped so that characters outside `[A-Za-z0-9._-]` (notably the
/// `:` separators of generated ids) are filename-safe on every platform.
/// Unreadable files are skipped by `find`/`count` with a warning rather than
/// failing the whole scan.
#[derive(Debug, Clone)]
pub struct JsonDatabase {
    root: PathBuf,
}

impl JsonDatabase {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(escape(collection))
    }

    fn path_for(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", escape(id)))
    }

    /// Load every parseable record in `collection`, ordered by file name.
    async fn scan(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let dir = self.collection_dir(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Io(err)),
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match read_record(&path).await {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %path.display(), %err, "skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

async fn read_record(path: &Path) -> StoreResult<Record> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("~{byte:02x}"));
            }
        }
    }
    out
}

#[async_trait]
impl Database for JsonDatabase {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        match fs::read(self.path_for(collection, id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn find(&self, collection: &str, filter: &Value) -> StoreResult<Vec<Record>> {
        let mut out = Vec::new();
        for record in self.scan(collection).await? {
            if matches(&record, filter)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn save(&self, collection: &str, record: Record) -> StoreResult<()> {
        let path = self.path_for(collection, record_id(collection, &record)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(&record)?;
        fs::write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(collection, id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn count(&self, collection: &str, filter: &Value) -> StoreResult<usize> {
        Ok(self.find(collection, filter).await?.len())
    }
}
