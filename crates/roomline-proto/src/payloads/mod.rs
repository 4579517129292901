//! JSON bodies.
//!
//! Two families live here: the bodies carried by STOMP `SEND` / `MESSAGE`
//! frames, and the REST resources the HTTP collaborators exchange. They share
//! types (a pushed [`ChatMessage`] is the same resource a history page
//! returns), so both are defined in one place.
//!
//! All field names are camelCase on the wire. Timestamps are local date-times
//! without an offset and parse as [`chrono::NaiveDateTime`].

mod account;
mod chat;
mod room;

pub use account::{
    Friend, FriendRequest, FriendRequestStatus, LoginRequest, RefreshRequest, SignUpRequest,
    SignUpResponse, TokenPair, UploadedFile, User,
};
pub use chat::{
    ChatMessage, MessageBody, MessageKind, ReadReceipt, ReadStatusEvent, SendMessageRequest,
};
pub use room::{ChatRoom, CreateRoomRequest, RoomKind, RoomSummary, RoomUpdate};
use serde::{Deserialize, Serialize};

/// REST response envelope: `{success, message, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the server handled the request.
    pub success: bool,
    /// Human-readable status, mostly set on failure.
    #[serde(default)]
    pub message: Option<String>,
    /// Payload. Absent for endpoints without a body.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Wrap a successful payload.
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, data: Some(data) }
    }
}
