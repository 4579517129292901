//! Application side-effects and intents.
//!
//! [`AppAction`]s are instructions produced by the [`crate::App`] state
//! machine. Session operations go through the [`crate::Bridge`]; REST calls
//! and rendering are executed by the [`crate::Runtime`].

use std::path::PathBuf;

use roomline_proto::{RoomId, payloads::SendMessageRequest};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Start the session.
    Connect,

    /// Close the session.
    Disconnect,

    /// Fetch the room list over REST.
    LoadRooms,

    /// Open a room: subscribe and fetch its newest history.
    OpenRoom {
        /// Room to open.
        room_id: RoomId,
    },

    /// Leave the room view.
    CloseRoom,

    /// Fetch older history for the open room.
    LoadOlder {
        /// Room to page.
        room_id: RoomId,
    },

    /// Publish a message.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Message body.
        request: SendMessageRequest,
    },

    /// Upload a file, then send it as an attachment.
    Upload {
        /// Target room.
        room_id: RoomId,
        /// Local file.
        path: PathBuf,
    },
}
