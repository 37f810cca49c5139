//! Capture pipeline
//!
//! Normalizes inbound events and upserts them into the chat's store. The
//! store applies last-write-wins per key, so the dispatcher must deliver
//! events for one identifier in arrival order.

use crate::archive::normalizer::parse_message;
use crate::error::Result;
use crate::store::ChatStore;
use crate::transport::event::InboundEvent;

/// Normalize `event` and upsert the result at its identifier.
///
/// The first-capture timestamp and the deletion flag of an existing record
/// survive the upsert, and `last_updated` never moves backwards, so
/// re-applying the same event is a no-op in effect.
pub async fn on_event(store: &dyn ChatStore, event: &InboundEvent) -> Result<()> {
    let mut record = parse_message(event.message(), event.is_edited());

    if let Some(existing) = store.get(&record.identifier).await? {
        record.created = existing.created;
        record.deleted = existing.deleted;
        if existing.last_updated > record.last_updated {
            record.last_updated = existing.last_updated;
        }
    }

    tracing::debug!(
        identifier = %record.identifier,
        edited = record.edited,
        "captured message"
    );
    let key = record.identifier.clone();
    store.set(&key, record).await
}
