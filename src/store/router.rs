//! Per-chat store routing
//!
//! Hands out one open [`JsonChatStore`] handle per chat, creating the backing
//! keyspace file on first use. Each chat's keyspace is a separate file, so
//! stores for different chats are fully independent.

use super::JsonChatStore;
use crate::error::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Capability that resolves a chat identity to its owned store handle.
pub struct StoreRouter {
    data_dir: PathBuf,
    open: RwLock<HashMap<i64, Arc<JsonChatStore>>>,
}

impl StoreRouter {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            open: RwLock::new(HashMap::new()),
        }
    }

    /// Return the open handle for `chat_id`, opening the keyspace if needed.
    pub async fn open(&self, chat_id: i64) -> Result<Arc<JsonChatStore>> {
        if let Some(store) = self.open.read().await.get(&chat_id) {
            return Ok(store.clone());
        }

        let mut table = self.open.write().await;
        // Another task may have opened it between the read and write locks
        if let Some(store) = table.get(&chat_id) {
            return Ok(store.clone());
        }

        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.data_dir.join(format!("{}.json", chat_id));
        let store = Arc::new(JsonChatStore::open(path).await?);
        table.insert(chat_id, store.clone());
        Ok(store)
    }

    /// Drop the open handle for `chat_id`; the keyspace file stays on disk.
    pub async fn close(&self, chat_id: i64) {
        self.open.write().await.remove(&chat_id);
    }
}
