//! Chat service transport
//!
//! The archival core drives the chat service through the [`ChatTransport`]
//! contract; [`TelegramTransport`] is the live Bot API implementation.

pub mod event;
mod telegram;

pub use telegram::{TelegramTransport, TgUpdate};

use crate::error::Result;
use async_trait::async_trait;
use self::event::MessageEvent;
use std::path::Path;

/// Outbound operations the core needs from the chat service.
///
/// `forward` doubles as the challenge operation during reconciliation: a
/// definitive rejection surfaces as [`crate::Error::ProbeNotFound`], while
/// transient failures keep their own variants and must never be read as
/// deletion evidence.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Forward one message position to another chat, returning the copy as
    /// delivered there.
    async fn forward(&self, from_chat: i64, message_id: i64, to_chat: i64)
        -> Result<MessageEvent>;

    /// Send a file, returning the sent message.
    async fn send_file(&self, to_chat: i64, path: &Path) -> Result<MessageEvent>;

    /// Send a text message, returning the sent message.
    async fn send_text(&self, to_chat: i64, text: &str) -> Result<MessageEvent>;
}
