//! Per-chat keyed persistence
//!
//! The archival core talks to storage through the [`ChatStore`] contract; a
//! store instance covers exactly one chat's keyspace. [`JsonChatStore`] is the
//! file-backed implementation and [`StoreRouter`] hands out one open store per
//! chat.

mod json;
mod router;

pub use json::JsonChatStore;
pub use router::StoreRouter;

use crate::archive::record::Record;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Keyed store contract for one chat's records.
///
/// `set` is unconditional last-write-wins; callers must serialize writes per
/// key. Read or write failures are storage errors and abort the enclosing
/// operation rather than silently dropping state.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Fetch the record stored at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Store `record` at `key`, replacing any previous value.
    async fn set(&self, key: &str, record: Record) -> Result<()>;

    /// All keys starting with `prefix`, ordered by message position.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Serialize every record to a flat row-oriented file at `path`.
    async fn export_to_file(&self, path: &Path) -> Result<()>;
}
