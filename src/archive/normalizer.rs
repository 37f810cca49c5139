//! Event normalization
//!
//! Converts a raw inbound message into a canonical [`Record`], resolving
//! attachment metadata and forwarded-identity provenance. Every function here
//! is side-effect free.

use crate::archive::record::{Media, Record};
use crate::transport::event::{Attachment, ForwardOrigin, MessageEvent};

/// Build a [`Record`] from one inbound message.
///
/// Text falls back to the caption for media messages, the author handle falls
/// back to the `"first last"` display form, and forward metadata is resolved
/// via [`resolve_forward`].
pub fn parse_message(event: &MessageEvent, edited: bool) -> Record {
    let sender = event.from.as_ref();
    let (is_forwarded, author, is_bot) = resolve_forward(&event.forward);
    let media = extract_media(event);

    Record {
        identifier: Record::identifier_for(event.chat.id, event.message_id),
        chat_id: event.chat.id,
        chat_type: event.chat.kind,
        chat_name: event.chat.name.clone(),
        user_id: sender.map(|s| s.id),
        username: sender.map(|s| s.handle_or_name()),
        message_id: event.message_id,
        text: event.text.clone().or_else(|| event.caption.clone()),
        created: Some(event.date),
        last_updated: event.date,
        edited,
        deleted: false,
        is_forwarded,
        author,
        is_bot,
        media: if media.is_media { Some(media) } else { None },
    }
}

/// Resolve forward provenance into `(is_forwarded, author, is_bot)`.
///
/// A hidden-user origin yields only the provided display name; the bot flag is
/// unknowable there and stays `false`. A known-user origin yields the user's
/// handle-or-name and account-type flag.
pub fn resolve_forward(origin: &ForwardOrigin) -> (bool, Option<String>, bool) {
    match origin {
        ForwardOrigin::Absent => (false, None, false),
        ForwardOrigin::HiddenUser { name } => (true, Some(name.clone()), false),
        ForwardOrigin::KnownUser { user } => (true, Some(user.handle_or_name()), user.is_bot),
    }
}

/// Extract the attachment descriptor for a message.
///
/// Kinds are inspected in priority order: document, photo (largest variant),
/// video, audio, voice. Returns a non-media descriptor when nothing is
/// attached.
pub fn extract_media(event: &MessageEvent) -> Media {
    match &event.attachment {
        Attachment::Document {
            file_id,
            file_name,
            mime_type,
        } => Media::file(file_id, file_name.as_deref(), mime_type.as_deref()),
        Attachment::Photo { sizes } => sizes
            .iter()
            .max_by_key(|size| size.width * size.height)
            .map(|size| Media::file(&size.file_id, None, None))
            .unwrap_or_else(Media::none),
        Attachment::Video {
            file_id,
            file_name,
            mime_type,
        } => Media::file(file_id, file_name.as_deref(), mime_type.as_deref()),
        Attachment::Audio {
            file_id,
            file_name,
            mime_type,
        } => Media::file(file_id, file_name.as_deref(), mime_type.as_deref()),
        Attachment::Voice { file_id, mime_type } => {
            Media::file(file_id, None, mime_type.as_deref())
        }
        Attachment::None => Media::none(),
    }
}
