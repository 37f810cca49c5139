//! Inbound event model
//!
//! Tagged representations of everything the chat service can deliver: new vs
//! edited messages, the union of attachment kinds, and the union of
//! forward-origin kinds. The normalizer is a total function over these
//! variants; no runtime type probing happens past this boundary.

use crate::archive::record::ChatType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound chat event: a fresh message or an edit notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InboundEvent {
    New(MessageEvent),
    Edited(MessageEvent),
}

impl InboundEvent {
    /// The message payload, regardless of variant.
    pub fn message(&self) -> &MessageEvent {
        match self {
            Self::New(message) | Self::Edited(message) => message,
        }
    }

    pub fn is_edited(&self) -> bool {
        matches!(self, Self::Edited(_))
    }
}

/// Conversation context attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    pub kind: ChatType,
    /// Group/channel title, or the peer's name in a private chat.
    pub name: Option<String>,
}

/// Sender identity as delivered by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_bot: bool,
}

impl Sender {
    /// `"first last"` display form.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    /// Handle when one exists, display form otherwise.
    pub fn handle_or_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.display_name())
    }
}

/// One photo variant; the service delivers several sizes per photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
}

/// Union of attachment kinds, each carrying its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attachment {
    None,
    Document {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    Photo {
        sizes: Vec<PhotoSize>,
    },
    Video {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    Audio {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    Voice {
        file_id: String,
        mime_type: Option<String>,
    },
}

impl Default for Attachment {
    fn default() -> Self {
        Self::None
    }
}

/// Union of forward-origin kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForwardOrigin {
    /// Not a forwarded message.
    Absent,
    /// Original sender hid their account; only a display name is known.
    HiddenUser { name: String },
    /// Original sender's account is visible.
    KnownUser { user: Sender },
}

impl Default for ForwardOrigin {
    fn default() -> Self {
        Self::Absent
    }
}

/// One message as delivered by the service, new, edited, or forwarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub chat: ChatInfo,
    /// Position in the chat's message sequence, issued by the service.
    pub message_id: i64,
    pub from: Option<Sender>,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub attachment: Attachment,
    #[serde(default)]
    pub forward: ForwardOrigin,
    /// Send time for new messages, edit time for edit notifications.
    pub date: DateTime<Utc>,
    /// Original send time carried by forward metadata, when present.
    pub forward_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_sender() -> Sender {
        Sender {
            id: 9,
            username: Some("alice".to_string()),
            first_name: "Alice".to_string(),
            last_name: Some("Liddell".to_string()),
            is_bot: false,
        }
    }

    #[test]
    fn test_display_name_forms() {
        let mut sender = make_sender();
        assert_eq!(sender.display_name(), "Alice Liddell");
        assert_eq!(sender.handle_or_name(), "alice");

        sender.username = None;
        assert_eq!(sender.handle_or_name(), "Alice Liddell");

        sender.last_name = None;
        assert_eq!(sender.display_name(), "Alice");
    }

    #[test]
    fn test_event_variant_accessors() {
        let message = MessageEvent {
            chat: ChatInfo {
                id: 1,
                kind: ChatType::Private,
                name: Some("Alice".to_string()),
            },
            message_id: 3,
            from: Some(make_sender()),
            text: Some("hi".to_string()),
            caption: None,
            attachment: Attachment::None,
            forward: ForwardOrigin::Absent,
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            forward_date: None,
        };

        let new = InboundEvent::New(message.clone());
        let edited = InboundEvent::Edited(message);
        assert!(!new.is_edited());
        assert!(edited.is_edited());
        assert_eq!(new.message().message_id, 3);
        assert_eq!(edited.message().message_id, 3);
    }
}
