//! JSON-file-backed chat store
//!
//! One chat keyspace is one JSON file holding the identifier → record map.
//! The map is loaded once at open and written through on every `set`; a
//! failed write surfaces as a storage error so deletion marks and
//! reconstructions are never silently lost.

use super::ChatStore;
use crate::archive::record::Record;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// File-backed store for one chat's records.
pub struct JsonChatStore {
    path: PathBuf,
    records: Arc<RwLock<HashMap<String, Record>>>,
}

impl JsonChatStore {
    /// Open the keyspace file at `path`, creating an empty keyspace when the
    /// file does not exist. An unreadable map is logged and treated as empty.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Failed to parse keyspace {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read keyspace {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Number of records currently stored.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Write the full map through to disk.
    async fn persist(&self, records: &HashMap<String, Record>) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            Error::Storage(format!(
                "failed to write keyspace {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl ChatStore for JsonChatStore {
    async fn get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, record: Record) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(key.to_string(), record);
        self.persist(&records).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut keys: Vec<String> = records
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort_by_key(|key| position_of(key));
        Ok(keys)
    }

    async fn export_to_file(&self, path: &Path) -> Result<()> {
        let records = self.records.read().await;
        let mut rows: Vec<&Record> = records.values().collect();
        rows.sort_by_key(|record| record.message_id);

        let mut out = String::new();
        out.push_str(&csv_line(&Record::export_header()));
        for record in rows {
            out.push_str(&csv_line(&record.export_row()));
        }

        tokio::fs::write(path, out).await.map_err(|e| {
            Error::Storage(format!("failed to write export {}: {}", path.display(), e))
        })
    }
}

/// Message position encoded in a `"{chat_id}/{message_id}"` key.
fn position_of(key: &str) -> i64 {
    key.rsplit('/')
        .next()
        .and_then(|part| part.parse().ok())
        .unwrap_or(0)
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|field| csv_escape(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
