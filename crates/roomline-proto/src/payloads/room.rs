use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::User;
use crate::{RoomId, UserId};

/// Room kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomKind {
    /// One-to-one conversation.
    Private,
    /// Named group.
    Group,
}

/// Room-list element as returned by `GET /api/v1/chat/rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room id.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Room kind.
    #[serde(rename = "type")]
    pub kind: RoomKind,
    /// Member count.
    #[serde(rename = "userCount")]
    pub member_count: u32,
    /// Preview of the latest message.
    #[serde(rename = "lastMessage", default)]
    pub last_message_preview: Option<String>,
    /// Nickname of the latest sender.
    #[serde(rename = "lastMessageSender", default)]
    pub last_sender: Option<String>,
    /// Time of the latest message (room creation time for empty rooms).
    pub last_message_time: NaiveDateTime,
    /// Messages the local user has not read.
    pub unread_count: u32,
}

impl RoomSummary {
    /// Copy of this summary with the live fields of `update` applied.
    pub fn with_update(&self, update: &RoomUpdate) -> Self {
        Self {
            last_message_preview: update.last_message.clone(),
            last_sender: Some(update.last_message_sender_nickname.clone()),
            last_message_time: update.last_message_time,
            unread_count: update.unread_count,
            ..self.clone()
        }
    }
}

/// Live room-list update pushed on the user's room topic.
///
/// The pushed body also carries `"type": "ROOM_UPDATE"`, which is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdate {
    /// Room the update is for.
    pub room_id: RoomId,
    /// Preview of the latest message.
    #[serde(default)]
    pub last_message: Option<String>,
    /// Time of the latest message.
    pub last_message_time: NaiveDateTime,
    /// Latest sender.
    pub last_message_sender_id: UserId,
    /// Latest sender's nickname.
    pub last_message_sender_nickname: String,
    /// Unread count for the local user.
    pub unread_count: u32,
}

/// Room detail as returned by `GET /api/v1/chat/rooms/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    /// Room id.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Room kind.
    #[serde(rename = "type")]
    pub kind: RoomKind,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Members.
    #[serde(default)]
    pub users: Vec<User>,
}

/// Body of `POST /api/v1/chat/rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Display name.
    pub name: String,
    /// Invited members.
    pub user_ids: Vec<UserId>,
}
