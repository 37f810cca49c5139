//! Export stage
//!
//! Serializes a chat's verified record set to a flat CSV snapshot, delivers
//! the file back through the chat, and captures the bot's own reply so the
//! archive includes its export artifacts.

use crate::archive::capture;
use crate::error::{Error, Result};
use crate::store::ChatStore;
use crate::transport::event::{ChatInfo, InboundEvent};
use crate::transport::ChatTransport;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

/// Writes snapshots and loops the delivery reply back into the archive.
pub struct Exporter {
    transport: Arc<dyn ChatTransport>,
    export_dir: PathBuf,
}

impl Exporter {
    pub fn new(transport: Arc<dyn ChatTransport>, export_dir: PathBuf) -> Self {
        Self {
            transport,
            export_dir,
        }
    }

    /// Export every record in `store` to a timestamped CSV file, send it to
    /// the chat, and archive the reply. Returns the snapshot path.
    pub async fn export_snapshot(
        &self,
        store: &dyn ChatStore,
        chat: &ChatInfo,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.export_dir).await.map_err(|e| {
            Error::Export(format!(
                "failed to create export dir {}: {}",
                self.export_dir.display(),
                e
            ))
        })?;
        let path = self.export_dir.join(format!(
            "{}-{}.csv",
            chat.id,
            Utc::now().format("%Y%m%dT%H%M%SZ")
        ));

        store.export_to_file(&path).await?;
        tracing::info!(chat_id = chat.id, path = %path.display(), "snapshot written");

        let reply = self.transport.send_file(chat.id, &path).await?;
        capture::on_event(store, &InboundEvent::New(reply)).await?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::record::{ChatType, Media, Record};
    use crate::store::JsonChatStore;
    use crate::transport::testing::MockTransport;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn make_chat() -> ChatInfo {
        ChatInfo {
            id: 42,
            kind: ChatType::Private,
            name: Some("Bob".to_string()),
        }
    }

    fn make_record(message_id: i64, media: Option<Media>) -> Record {
        Record {
            identifier: Record::identifier_for(42, message_id),
            chat_id: 42,
            chat_type: ChatType::Private,
            chat_name: Some("Bob".to_string()),
            user_id: Some(9),
            username: Some("bob".to_string()),
            message_id,
            text: Some(format!("message {}", message_id)),
            created: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            last_updated: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            edited: false,
            deleted: false,
            is_forwarded: false,
            author: None,
            is_bot: false,
            media,
        }
    }

    #[tokio::test]
    async fn test_export_completeness() {
        let dir = TempDir::new().unwrap();
        let store = JsonChatStore::open(dir.path().join("42.json")).await.unwrap();
        let records = vec![
            make_record(1, None),
            make_record(2, Some(Media::file("file-1", Some("pic.jpg"), Some("image/jpeg")))),
            make_record(3, None),
        ];
        for record in records {
            store.set(&record.identifier.clone(), record).await.unwrap();
        }

        let transport = Arc::new(MockTransport::new(HashMap::new()));
        let exporter = Exporter::new(transport.clone(), dir.path().join("exports"));
        let path = exporter.export_snapshot(&store, &make_chat()).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        // Header plus exactly one row per stored key
        assert_eq!(lines.len(), 1 + 3);
        assert!(lines[1].starts_with("42/1,"));
        assert!(lines[2].contains("pic.jpg"));
        assert!(lines[3].starts_with("42/3,"));

        // The file went back to the requesting chat
        let sent = transport.sent_files.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert_eq!(sent[0].1, path);
    }

    #[tokio::test]
    async fn test_export_reply_is_archived() {
        let dir = TempDir::new().unwrap();
        let store = JsonChatStore::open(dir.path().join("42.json")).await.unwrap();
        let record = make_record(1, None);
        store.set(&record.identifier.clone(), record).await.unwrap();

        let transport = Arc::new(MockTransport::new(HashMap::new()));
        let exporter = Exporter::new(transport, dir.path().join("exports"));
        exporter.export_snapshot(&store, &make_chat()).await.unwrap();

        // The bot's own reply landed in the store as a fresh captured record
        let keys = store.keys("42/").await.unwrap();
        assert_eq!(keys.len(), 2);
        let reply = store.get(keys.last().unwrap()).await.unwrap().unwrap();
        assert_eq!(reply.username.as_deref(), Some("chatvault_bot"));
        assert!(reply.created.is_some());
    }
}
