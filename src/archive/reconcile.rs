//! Challenge-based reconciliation
//!
//! The chat service gives no deletion notifications, so the only way to learn
//! a message's fate is to challenge it: attempt to forward its position to a
//! fixed verification sink. A successful forward proves the message still
//! exists (and yields enough metadata to reconstruct a never-captured one); a
//! definitive rejection marks a captured record deleted.

use crate::archive::normalizer::{extract_media, resolve_forward};
use crate::archive::record::{ChatType, Record};
use crate::error::{Error, Result};
use crate::store::ChatStore;
use crate::transport::event::{ChatInfo, MessageEvent};
use crate::transport::ChatTransport;
use chrono::Utc;
use std::ops::Range;
use std::sync::Arc;

/// Per-pass outcome counts, reported back to the requesting user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Positions whose stored record the challenge reconfirmed.
    pub confirmed: usize,
    /// Positions reconstructed from a successful challenge with no local record.
    pub reconstructed: usize,
    /// Positions newly marked deleted.
    pub deleted: usize,
    /// Positions with neither a local record nor a live message.
    pub missing: usize,
    /// Positions skipped on transient transport failure.
    pub skipped: usize,
}

impl ReconcileSummary {
    pub fn probed(&self) -> usize {
        self.confirmed + self.reconstructed + self.deleted + self.missing + self.skipped
    }
}

impl std::fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} probed: {} confirmed, {} reconstructed, {} deleted, {} missing, {} skipped",
            self.probed(),
            self.confirmed,
            self.reconstructed,
            self.deleted,
            self.missing,
            self.skipped
        )
    }
}

/// Walks message positions and reconciles local records against the live
/// service via challenge forwards to the verification sink.
pub struct Reconciler {
    transport: Arc<dyn ChatTransport>,
    sink: i64,
}

impl Reconciler {
    pub fn new(transport: Arc<dyn ChatTransport>, sink: i64) -> Self {
        Self { transport, sink }
    }

    /// Reconcile `chat` over `range`, ascending.
    ///
    /// `requester` is the display name of the user who triggered the pass;
    /// it feeds the private-chat forward heuristic for reconstructed records.
    /// Transport failures are isolated per position; storage failures abort
    /// the pass.
    pub async fn reconcile(
        &self,
        store: &dyn ChatStore,
        chat: &ChatInfo,
        requester: Option<&str>,
        range: Range<i64>,
    ) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        tracing::info!(chat_id = chat.id, ?range, "reconciliation pass starting");

        for position in range {
            let key = Record::identifier_for(chat.id, position);
            let local = store.get(&key).await?;

            match self.transport.forward(chat.id, position, self.sink).await {
                Ok(copy) => {
                    if local.is_some() {
                        // Existence reconfirmed; a concurrent edit must not be
                        // overwritten, so nothing is written back.
                        summary.confirmed += 1;
                    } else {
                        let record = reconstruct(chat, position, &copy, requester);
                        tracing::info!(identifier = %key, "reconstructed missing record");
                        store.set(&key, record).await?;
                        summary.reconstructed += 1;
                    }
                }
                Err(Error::ProbeNotFound) => match local {
                    Some(record) if !record.deleted => {
                        let mut record = record;
                        record.deleted = true;
                        record.last_updated = Utc::now();
                        tracing::info!(identifier = %key, "marking record deleted");
                        store.set(&key, record).await?;
                        summary.deleted += 1;
                    }
                    Some(_) => {
                        // Already marked; deletion is one-way
                        summary.confirmed += 1;
                    }
                    None => {
                        tracing::debug!(
                            chat_id = chat.id,
                            position,
                            "no record and no live message; nothing to do"
                        );
                        summary.missing += 1;
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        chat_id = chat.id,
                        position,
                        error = %err,
                        "challenge failed transiently; position skipped"
                    );
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(chat_id = chat.id, %summary, "reconciliation pass finished");
        Ok(summary)
    }
}

/// Build a record for a position known only through a successful challenge.
///
/// Original capture-time identity and timestamp are unrecoverable: `created`,
/// `user_id` and `username` stay `None`, and `last_updated` is the origin
/// timestamp carried by the forwarded copy.
fn reconstruct(
    chat: &ChatInfo,
    position: i64,
    copy: &MessageEvent,
    requester: Option<&str>,
) -> Record {
    let (_, author, is_bot) = resolve_forward(&copy.forward);
    let media = extract_media(copy);

    // The copy's forward origin names whoever authored the probed message. In
    // a private chat a name other than the requester's means the message got
    // into their history by forwarding; in groups that inference is
    // unavailable. Best-effort heuristic, not an identity check.
    let is_forwarded = chat.kind == ChatType::Private
        && match (author.as_deref(), requester) {
            (Some(origin), Some(requester)) => origin != requester,
            _ => false,
        };

    Record {
        identifier: Record::identifier_for(chat.id, position),
        chat_id: chat.id,
        chat_type: chat.kind,
        chat_name: chat.name.clone(),
        user_id: None,
        username: None,
        message_id: position,
        text: copy.text.clone().or_else(|| copy.caption.clone()),
        created: None,
        last_updated: copy.forward_date.unwrap_or(copy.date),
        edited: false,
        deleted: false,
        is_forwarded,
        author,
        is_bot,
        media: if media.is_media { Some(media) } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonChatStore;
    use crate::transport::testing::{MockTransport, ProbeOutcome};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const SINK: i64 = 75316412;

    fn group_chat() -> ChatInfo {
        ChatInfo {
            id: 42,
            kind: ChatType::Group,
            name: Some("lounge".to_string()),
        }
    }

    fn private_chat() -> ChatInfo {
        ChatInfo {
            id: 42,
            kind: ChatType::Private,
            name: Some("Bob".to_string()),
        }
    }

    fn stored_record(chat_id: i64, message_id: i64) -> Record {
        Record {
            identifier: Record::identifier_for(chat_id, message_id),
            chat_id,
            chat_type: ChatType::Group,
            chat_name: Some("lounge".to_string()),
            user_id: Some(9),
            username: Some("alice".to_string()),
            message_id,
            text: Some(format!("message {}", message_id)),
            created: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            last_updated: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            edited: false,
            deleted: false,
            is_forwarded: false,
            author: None,
            is_bot: false,
            media: None,
        }
    }

    async fn seed(store: &JsonChatStore, record: Record) {
        store.set(&record.identifier.clone(), record).await.unwrap();
    }

    fn found(text: &str) -> ProbeOutcome {
        ProbeOutcome::Found(MockTransport::forwarded_copy(SINK, text, "Alice"))
    }

    #[tokio::test]
    async fn test_reconciliation_coverage() {
        let dir = TempDir::new().unwrap();
        let store = JsonChatStore::open(dir.path().join("42.json")).await.unwrap();
        for position in [1, 3, 5] {
            seed(&store, stored_record(42, position)).await;
        }

        let mut oracle = HashMap::new();
        oracle.insert(1, found("one"));
        oracle.insert(2, ProbeOutcome::NotFound);
        oracle.insert(3, ProbeOutcome::NotFound);
        oracle.insert(4, found("four"));
        oracle.insert(5, found("five"));
        let transport = Arc::new(MockTransport::new(oracle));

        let reconciler = Reconciler::new(transport.clone(), SINK);
        let summary = reconciler
            .reconcile(&store, &group_chat(), Some("Bob"), 1..6)
            .await
            .unwrap();

        assert_eq!(summary.confirmed, 2);
        assert_eq!(summary.reconstructed, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.skipped, 0);

        // Position 3: marked deleted, lastUpdated advanced
        let deleted = store.get("42/3").await.unwrap().unwrap();
        assert!(deleted.deleted);
        assert!(deleted.last_updated > Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        // Positions 1 and 5: untouched
        assert_eq!(store.get("42/1").await.unwrap().unwrap(), stored_record(42, 1));
        assert_eq!(store.get("42/5").await.unwrap().unwrap(), stored_record(42, 5));

        // Position 4: reconstructed with no capture-time identity
        let rebuilt = store.get("42/4").await.unwrap().unwrap();
        assert!(rebuilt.created.is_none());
        assert!(rebuilt.user_id.is_none());
        assert!(rebuilt.username.is_none());
        assert_eq!(rebuilt.text.as_deref(), Some("four"));
        assert_eq!(
            rebuilt.last_updated,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );

        // Position 2: never seen, no tombstone fabricated
        assert!(store.get("42/2").await.unwrap().is_none());

        // Every probe went to the verification sink
        for (_, _, to_chat) in transport.forwards.lock().await.iter() {
            assert_eq!(*to_chat, SINK);
        }
    }

    #[tokio::test]
    async fn test_deletion_is_one_way() {
        let dir = TempDir::new().unwrap();
        let store = JsonChatStore::open(dir.path().join("42.json")).await.unwrap();
        let mut record = stored_record(42, 1);
        record.deleted = true;
        let tombstone_updated = record.last_updated;
        seed(&store, record).await;

        // Even if a later pass finds the message again, the mark stays
        let mut oracle = HashMap::new();
        oracle.insert(1, found("one"));
        let reconciler = Reconciler::new(Arc::new(MockTransport::new(oracle)), SINK);
        reconciler
            .reconcile(&store, &group_chat(), None, 1..2)
            .await
            .unwrap();
        assert!(store.get("42/1").await.unwrap().unwrap().deleted);

        // A repeated not-found leaves the tombstone untouched
        let mut oracle = HashMap::new();
        oracle.insert(1, ProbeOutcome::NotFound);
        let reconciler = Reconciler::new(Arc::new(MockTransport::new(oracle)), SINK);
        let summary = reconciler
            .reconcile(&store, &group_chat(), None, 1..2)
            .await
            .unwrap();
        assert_eq!(summary.deleted, 0);
        let after = store.get("42/1").await.unwrap().unwrap();
        assert!(after.deleted);
        assert_eq!(after.last_updated, tombstone_updated);
    }

    #[tokio::test]
    async fn test_transient_failure_is_not_deletion_evidence() {
        let dir = TempDir::new().unwrap();
        let store = JsonChatStore::open(dir.path().join("42.json")).await.unwrap();
        seed(&store, stored_record(42, 1)).await;

        let mut oracle = HashMap::new();
        oracle.insert(1, ProbeOutcome::Transient);
        oracle.insert(2, ProbeOutcome::NotFound);
        let reconciler = Reconciler::new(Arc::new(MockTransport::new(oracle)), SINK);
        let summary = reconciler
            .reconcile(&store, &group_chat(), None, 1..3)
            .await
            .unwrap();

        // Position 1 skipped, record untouched; position 2 simply missing
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.missing, 1);
        assert!(!store.get("42/1").await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn test_private_chat_forward_heuristic() {
        let dir = TempDir::new().unwrap();
        let store = JsonChatStore::open(dir.path().join("42.json")).await.unwrap();

        // Origin "Alice" differs from requester "Bob": a genuine prior forward
        let mut oracle = HashMap::new();
        oracle.insert(1, found("carried over"));
        let reconciler = Reconciler::new(Arc::new(MockTransport::new(oracle)), SINK);
        reconciler
            .reconcile(&store, &private_chat(), Some("Bob"), 1..2)
            .await
            .unwrap();
        let rebuilt = store.get("42/1").await.unwrap().unwrap();
        assert!(rebuilt.is_forwarded);
        assert_eq!(rebuilt.author.as_deref(), Some("Alice"));

        // Origin matches the requester: an artifact of the probe itself
        let mut oracle = HashMap::new();
        oracle.insert(2, found("own message"));
        let reconciler = Reconciler::new(Arc::new(MockTransport::new(oracle)), SINK);
        reconciler
            .reconcile(&store, &private_chat(), Some("Alice"), 2..3)
            .await
            .unwrap();
        assert!(!store.get("42/2").await.unwrap().unwrap().is_forwarded);
    }

    #[tokio::test]
    async fn test_group_chat_reconstruction_not_classified_forwarded() {
        let dir = TempDir::new().unwrap();
        let store = JsonChatStore::open(dir.path().join("42.json")).await.unwrap();

        let mut oracle = HashMap::new();
        oracle.insert(1, found("group message"));
        let reconciler = Reconciler::new(Arc::new(MockTransport::new(oracle)), SINK);
        reconciler
            .reconcile(&store, &group_chat(), Some("Bob"), 1..2)
            .await
            .unwrap();

        let rebuilt = store.get("42/1").await.unwrap().unwrap();
        assert!(!rebuilt.is_forwarded);
        // The origin author is still recorded
        assert_eq!(rebuilt.author.as_deref(), Some("Alice"));
    }
}
