use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{MessageId, RoomId, UserId};

/// Kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Uploaded image.
    Image,
    /// Uploaded file of any other type.
    File,
    /// Animated GIF.
    Gif,
}

impl MessageKind {
    /// Pick the attachment kind for an uploaded file's MIME type.
    ///
    /// `image/gif` is a GIF, any other `image/*` an image, everything else a
    /// file.
    pub fn for_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime == "image/gif" {
            Self::Gif
        } else if mime.starts_with("image/") {
            Self::Image
        } else {
            Self::File
        }
    }

    /// MIME type for an upload, guessed from the file extension.
    ///
    /// Unknown extensions are `application/octet-stream`.
    pub fn guess_mime(file_name: &str) -> &'static str {
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("gif") => "image/gif",
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("pdf") => "application/pdf",
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }

    /// Whether messages of this kind carry a file instead of text.
    pub const fn is_attachment(self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// A message as the server stores and pushes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Monotonic id within the room.
    pub message_id: MessageId,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Author's display name at send time.
    pub sender_nickname: String,
    /// Author's avatar.
    #[serde(default)]
    pub sender_profile_image_url: Option<String>,
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text content, set for [`MessageKind::Text`].
    #[serde(default)]
    pub content: Option<String>,
    /// Attachment URL, set for attachment kinds.
    #[serde(default)]
    pub file_url: Option<String>,
    /// Attachment file name, set for attachment kinds.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Server timestamp.
    pub created_at: NaiveDateTime,
    /// Room members that have not read this message yet.
    pub unread_count: u32,
}

/// Type-directed view of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody<'a> {
    /// Text message.
    Text(&'a str),
    /// Image, file or GIF.
    Attachment {
        /// Attachment kind.
        kind: MessageKind,
        /// Where the file is served from.
        url: &'a str,
        /// Original file name.
        name: &'a str,
    },
}

impl ChatMessage {
    /// Body according to the message kind.
    ///
    /// Fields that do not belong to the kind are ignored. Missing fields read
    /// as empty strings.
    pub fn body(&self) -> MessageBody<'_> {
        if self.kind.is_attachment() {
            MessageBody::Attachment {
                kind: self.kind,
                url: self.file_url.as_deref().unwrap_or_default(),
                name: self.file_name.as_deref().unwrap_or_default(),
            }
        } else {
            MessageBody::Text(self.content.as_deref().unwrap_or_default())
        }
    }
}

/// Body published to a room's message topic.
///
/// Built through [`SendMessageRequest::text`] or
/// [`SendMessageRequest::attachment`], so text and file fields are never both
/// set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
}

impl SendMessageRequest {
    /// Text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            content: Some(content.into()),
            file_url: None,
            file_name: None,
        }
    }

    /// Attachment message. A `Text` kind is coerced to `File`.
    pub fn attachment(kind: MessageKind, url: impl Into<String>, name: impl Into<String>) -> Self {
        let kind = if kind.is_attachment() { kind } else { MessageKind::File };
        Self { kind, content: None, file_url: Some(url.into()), file_name: Some(name.into()) }
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Text content, if this is a text message.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Attachment URL and name, if this is an attachment.
    pub fn file(&self) -> Option<(&str, &str)> {
        Some((self.file_url.as_deref()?, self.file_name.as_deref()?))
    }
}

/// Body published to a room's read-status topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Highest message the reader has seen.
    pub message_id: MessageId,
}

/// Read receipt pushed on a room's read-status topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadStatusEvent {
    /// Reader.
    pub user_id: UserId,
    /// Highest message the reader has seen.
    pub message_id: MessageId,
}
