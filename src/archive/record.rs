//! Canonical archival entities
//!
//! A [`Record`] is the stored representation of one chat message. Records are
//! keyed by `identifier` (`"{chat_id}/{message_id}"`), flagged rather than
//! removed on deletion, and flattened to one row each on export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// Private DM with a user.
    Private,
    /// Small group chat.
    Group,
    /// Supergroup (megagroup).
    Supergroup,
    /// Broadcast channel.
    Channel,
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Group => write!(f, "group"),
            Self::Supergroup => write!(f, "supergroup"),
            Self::Channel => write!(f, "channel"),
        }
    }
}

impl std::str::FromStr for ChatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "group" => Ok(Self::Group),
            "supergroup" => Ok(Self::Supergroup),
            "channel" => Ok(Self::Channel),
            other => Err(format!("unknown chat type: {}", other)),
        }
    }
}

/// Attachment descriptor. Immutable once constructed.
///
/// `file_id` is an opaque reference into the chat service's file storage and
/// is present iff `is_media` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub is_media: bool,
    pub file_id: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

impl Media {
    /// Descriptor for a message with no attachment.
    pub fn none() -> Self {
        Self {
            is_media: false,
            file_id: None,
            filename: None,
            mime_type: None,
        }
    }

    /// Descriptor for an attachment with the given file reference.
    pub fn file(file_id: &str, filename: Option<&str>, mime_type: Option<&str>) -> Self {
        Self {
            is_media: true,
            file_id: Some(file_id.to_string()),
            filename: filename.map(str::to_string),
            mime_type: mime_type.map(str::to_string),
        }
    }
}

/// One archived message.
///
/// A record is either *captured* (observed directly, `created` set) or
/// *reconstructed* (known only through a successful challenge during
/// reconciliation: `created`, `user_id` and `username` are all `None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Sole store key, `"{chat_id}/{message_id}"`. Never mutated.
    pub identifier: String,
    pub chat_id: i64,
    pub chat_type: ChatType,
    pub chat_name: Option<String>,
    /// Original author identity; `None` when unrecoverable.
    pub user_id: Option<i64>,
    pub username: Option<String>,
    /// Position in the chat's message sequence; reconciliation range index.
    pub message_id: i64,
    /// Body or caption; `None` for pure-media messages.
    pub text: Option<String>,
    /// First-capture timestamp; `None` for reconstructed records.
    pub created: Option<DateTime<Utc>>,
    /// Most recent observed state (edit or reconciliation confirmation).
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub deleted: bool,
    /// Forwarding provenance, set only when the message carries forward metadata.
    #[serde(default)]
    pub is_forwarded: bool,
    pub author: Option<String>,
    /// Only meaningful when the forwarder's account type is known (not hidden).
    #[serde(default)]
    pub is_bot: bool,
    pub media: Option<Media>,
}

impl Record {
    /// Compose the store key for a chat position.
    pub fn identifier_for(chat_id: i64, message_id: i64) -> String {
        format!("{}/{}", chat_id, message_id)
    }

    /// Key prefix selecting every record of one chat.
    pub fn chat_prefix(chat_id: i64) -> String {
        format!("{}/", chat_id)
    }

    /// Column names of the flat export form, media fields flattened last as
    /// `is_media,file_id,filename,mime_type`.
    pub fn export_header() -> [&'static str; 19] {
        [
            "identifier",
            "chat_id",
            "chat_type",
            "chat_name",
            "user_id",
            "username",
            "message_id",
            "text",
            "created",
            "last_updated",
            "edited",
            "deleted",
            "is_forwarded",
            "author",
            "is_bot",
            "is_media",
            "file_id",
            "filename",
            "mime_type",
        ]
    }

    /// Flatten to one export row, in [`Record::export_header`] order.
    pub fn export_row(&self) -> Vec<String> {
        let media = self.media.clone().unwrap_or_else(Media::none);
        vec![
            self.identifier.clone(),
            self.chat_id.to_string(),
            self.chat_type.to_string(),
            self.chat_name.clone().unwrap_or_default(),
            self.user_id.map(|id| id.to_string()).unwrap_or_default(),
            self.username.clone().unwrap_or_default(),
            self.message_id.to_string(),
            self.text.clone().unwrap_or_default(),
            self.created.map(|t| t.to_rfc3339()).unwrap_or_default(),
            self.last_updated.to_rfc3339(),
            self.edited.to_string(),
            self.deleted.to_string(),
            self.is_forwarded.to_string(),
            self.author.clone().unwrap_or_default(),
            self.is_bot.to_string(),
            media.is_media.to_string(),
            media.file_id.unwrap_or_default(),
            media.filename.unwrap_or_default(),
            media.mime_type.unwrap_or_default(),
        ]
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}\n\n{}\n\n@{}",
            self.username.as_deref().unwrap_or("unknown"),
            self.chat_name.as_deref().unwrap_or("unknown"),
            self.text.as_deref().unwrap_or(""),
            self.last_updated.to_rfc3339(),
        )?;
        if self.deleted {
            write!(f, " (deleted)")?;
        } else if self.edited {
            write!(f, " (edited)")?;
        }
        Ok(())
    }
}
