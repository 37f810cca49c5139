//! Chatvault - chat history archival with challenge-based verification
//!
//! Chatvault archives the message history of Telegram conversations into a
//! durable, per-chat keyed store, and can reconcile that store against the
//! live service to detect edits, deletions, and gaps. The service sends no
//! deletion notifications, so reconciliation *challenges* each message
//! position by forwarding it to a fixed verification sink: a successful
//! forward proves the message still exists (and reconstructs records the bot
//! never saw), a definitive rejection marks the stored record deleted.
//!
//! ## Data flow
//!
//! ```text
//! inbound event ──▶ capture pipeline ──▶ per-chat store
//!
//! /export ──▶ reconciliation engine ──▶ export stage ──▶ CSV reply
//!                (probe + repair)        (snapshot, and the reply
//!                                         is archived in turn)
//! ```
//!
//! ## Modules
//!
//! - [`archive`]: record model, normalizer, capture, reconciliation, export
//! - [`store`]: per-chat keyed persistence and the store router
//! - [`transport`]: chat service contract and the Telegram Bot API client
//! - [`bot`]: update dispatch and user-facing commands
//! - [`config`]: configuration management

pub mod archive;
pub mod bot;
pub mod config;
pub mod error;
pub mod store;
pub mod transport;

pub use config::ChatVaultConfig;
pub use error::{Error, Result};
