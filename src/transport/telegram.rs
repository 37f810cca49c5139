//! Telegram Bot API transport
//!
//! Long-polls `getUpdates` for inbound events and implements the outbound
//! [`ChatTransport`] operations over `forwardMessage`, `sendDocument` and
//! `sendMessage`. This is also where raw updates become typed
//! [`InboundEvent`]s; an update carrying neither a new nor an edited message
//! is logged as malformed and dropped.

use super::event::{
    Attachment, ChatInfo, ForwardOrigin, InboundEvent, MessageEvent, PhotoSize, Sender,
};
use super::ChatTransport;
use crate::archive::record::ChatType;
use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Live Bot API client.
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    token: String,
    poll_timeout_secs: u64,
}

impl TelegramTransport {
    /// Build a client from configuration, resolving the bot token from the
    /// environment variable named by `bot_token_ref`.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let token = std::env::var(&config.bot_token_ref).map_err(|_| {
            Error::Config(format!(
                "Failed to resolve bot token from env var: {}",
                config.bot_token_ref
            ))
        })?;

        // The HTTP timeout must outlast the long-poll window
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await?;
        let body: TgResponse<T> = response.json().await?;
        body.into_result()
    }

    /// Long-poll for updates past `offset`.
    pub async fn poll_updates(&self, offset: i64) -> Result<Vec<TgUpdate>> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message", "edited_message"],
            }),
        )
        .await
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn forward(
        &self,
        from_chat: i64,
        message_id: i64,
        to_chat: i64,
    ) -> Result<MessageEvent> {
        let result: Result<TgMessage> = self
            .call(
                "forwardMessage",
                serde_json::json!({
                    "chat_id": to_chat,
                    "from_chat_id": from_chat,
                    "message_id": message_id,
                    "disable_notification": true,
                }),
            )
            .await;
        match result {
            Ok(message) => Ok(message.into_event()),
            Err(err) => Err(classify_forward_error(err)),
        }
    }

    async fn send_file(&self, to_chat: i64, path: &Path) -> Result<MessageEvent> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export.csv".to_string());
        let form = reqwest::multipart::Form::new()
            .text("chat_id", to_chat.to_string())
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        let body: TgResponse<TgMessage> = response.json().await?;
        Ok(body.into_result()?.into_event())
    }

    async fn send_text(&self, to_chat: i64, text: &str) -> Result<MessageEvent> {
        let message: TgMessage = self
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": to_chat,
                    "text": text,
                }),
            )
            .await?;
        Ok(message.into_event())
    }
}

/// A definitive API rejection of a forward means the target message is gone;
/// anything else stays a transport-level failure.
fn classify_forward_error(err: Error) -> Error {
    match err {
        Error::Api { code: 400, description } | Error::Api { code: 403, description } => {
            tracing::debug!(%description, "challenge rejected by API");
            Error::ProbeNotFound
        }
        other => other,
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

impl<T> TgResponse<T> {
    fn into_result(self) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Api {
                code: self.error_code.unwrap_or(0),
                description: self
                    .description
                    .unwrap_or_else(|| "unspecified API failure".to_string()),
            }),
        }
    }
}

/// One raw update as delivered by `getUpdates`.
#[derive(Debug, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    message: Option<TgMessage>,
    edited_message: Option<TgMessage>,
}

impl TgUpdate {
    /// Convert to a typed event. Exactly one of the new/edited payloads must
    /// be present; otherwise the update is malformed and dropped.
    pub fn into_event(self) -> Option<InboundEvent> {
        match (self.message, self.edited_message) {
            (Some(message), None) => Some(InboundEvent::New(message.into_event())),
            (None, Some(message)) => Some(InboundEvent::Edited(message.into_event())),
            _ => {
                tracing::warn!(update_id = self.update_id, "malformed update dropped");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    date: i64,
    edit_date: Option<i64>,
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
    caption: Option<String>,
    document: Option<TgDocument>,
    photo: Option<Vec<TgPhotoSize>>,
    video: Option<TgVideo>,
    audio: Option<TgAudio>,
    voice: Option<TgVoice>,
    forward_origin: Option<TgMessageOrigin>,
}

impl TgMessage {
    fn into_event(self) -> MessageEvent {
        let attachment = if let Some(document) = self.document {
            Attachment::Document {
                file_id: document.file_id,
                file_name: document.file_name,
                mime_type: document.mime_type,
            }
        } else if let Some(photo) = self.photo.filter(|sizes| !sizes.is_empty()) {
            Attachment::Photo {
                sizes: photo
                    .into_iter()
                    .map(|size| PhotoSize {
                        file_id: size.file_id,
                        width: size.width,
                        height: size.height,
                    })
                    .collect(),
            }
        } else if let Some(video) = self.video {
            Attachment::Video {
                file_id: video.file_id,
                file_name: video.file_name,
                mime_type: video.mime_type,
            }
        } else if let Some(audio) = self.audio {
            Attachment::Audio {
                file_id: audio.file_id,
                file_name: audio.file_name,
                mime_type: audio.mime_type,
            }
        } else if let Some(voice) = self.voice {
            Attachment::Voice {
                file_id: voice.file_id,
                mime_type: voice.mime_type,
            }
        } else {
            Attachment::None
        };

        let (forward, forward_date) = match self.forward_origin {
            None => (ForwardOrigin::Absent, None),
            Some(TgMessageOrigin::User { date, sender_user }) => (
                ForwardOrigin::KnownUser {
                    user: sender_user.into(),
                },
                Some(datetime_from(date)),
            ),
            Some(TgMessageOrigin::HiddenUser {
                date,
                sender_user_name,
            }) => (
                ForwardOrigin::HiddenUser {
                    name: sender_user_name,
                },
                Some(datetime_from(date)),
            ),
            // A chat or channel origin exposes no account, only a title
            Some(TgMessageOrigin::Chat { date, sender_chat }) => (
                ForwardOrigin::HiddenUser {
                    name: sender_chat.display_name(),
                },
                Some(datetime_from(date)),
            ),
            Some(TgMessageOrigin::Channel { date, chat }) => (
                ForwardOrigin::HiddenUser {
                    name: chat.display_name(),
                },
                Some(datetime_from(date)),
            ),
        };

        MessageEvent {
            message_id: self.message_id,
            from: self.from.map(Into::into),
            text: self.text,
            caption: self.caption,
            attachment,
            forward,
            // Edit notifications carry the edit time as the observed state
            date: datetime_from(self.edit_date.unwrap_or(self.date)),
            forward_date,
            chat: self.chat.into_info(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl TgChat {
    fn display_name(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.username.clone().unwrap_or_else(|| self.id.to_string()),
        }
    }

    fn into_info(self) -> ChatInfo {
        let kind = self.kind.parse().unwrap_or_else(|err| {
            tracing::warn!(chat_id = self.id, "{}; assuming group", err);
            ChatType::Group
        });
        ChatInfo {
            id: self.id,
            kind,
            name: Some(self.display_name()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    is_bot: bool,
    first_name: String,
    last_name: Option<String>,
    username: Option<String>,
}

impl From<TgUser> for Sender {
    fn from(user: TgUser) -> Self {
        Sender {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_bot: user.is_bot,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgDocument {
    file_id: String,
    file_name: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgPhotoSize {
    file_id: String,
    width: i64,
    height: i64,
}

#[derive(Debug, Deserialize)]
struct TgVideo {
    file_id: String,
    file_name: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgAudio {
    file_id: String,
    file_name: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgVoice {
    file_id: String,
    mime_type: Option<String>,
}

/// Message-origin union from the Bot API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TgMessageOrigin {
    User { date: i64, sender_user: TgUser },
    HiddenUser { date: i64, sender_user_name: String },
    Chat { date: i64, sender_chat: TgChat },
    Channel { date: i64, chat: TgChat },
}

fn datetime_from(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
