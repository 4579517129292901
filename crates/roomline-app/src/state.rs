//! Observable application state types.
//!
//! These structures are the view model: what a frontend needs to render,
//! without the subscription and cache mechanics of the client.

use roomline_proto::{
    RoomId,
    payloads::{ChatMessage, MessageBody},
};

/// Connection state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Connection lost; a reconnect is scheduled.
    Reconnecting,
    /// Live.
    Connected,
}

/// Which view is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// The room list.
    RoomList,
    /// A room's timeline.
    Room {
        /// The open room.
        room_id: RoomId,
    },
}

/// Timeline of the open room as last reported by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomView {
    /// Messages, ascending by id.
    pub messages: Vec<ChatMessage>,
    /// Whether older history can be loaded.
    pub has_more: bool,
    /// Set when the view should jump to the newest message on next render.
    pub follow_latest: bool,
}

/// One-line rendering of a message.
pub fn message_line(message: &ChatMessage) -> String {
    let body = match message.body() {
        MessageBody::Text(text) => text.to_string(),
        MessageBody::Attachment { kind, url, name } => format!("[{kind:?}] {name} <{url}>"),
    };

    if message.unread_count > 0 {
        format!("{}: {} ({})", message.sender_nickname, body, message.unread_count)
    } else {
        format!("{}: {}", message.sender_nickname, body)
    }
}
