//! Application input events.
//!
//! Events originate from three sources:
//! - User input and periodic ticks
//! - Client notifications translated by the [`crate::Bridge`]
//! - Results of REST calls executed by the [`crate::Runtime`]

use roomline_core::CacheSnapshot;
use roomline_proto::{
    RoomId,
    payloads::{ChatMessage, MessageKind, RoomSummary, UploadedFile},
};

use crate::UserInput;

/// Events processed by the App state machine.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// User intent.
    Input(UserInput),

    /// Periodic tick.
    Tick,

    /// Handshake in progress.
    Connecting,

    /// Session established.
    Connected,

    /// Session lost or closed.
    Disconnected {
        /// Whether a reconnect is scheduled.
        will_retry: bool,
    },

    /// REST room list arrived.
    RoomsLoaded(Vec<RoomSummary>),

    /// Live room updates changed.
    RoomUpdates(CacheSnapshot),

    /// Timeline of a room changed.
    TimelineChanged {
        /// Room.
        room_id: RoomId,
        /// Full timeline, ascending by id.
        messages: Vec<ChatMessage>,
        /// Whether older history can be loaded.
        has_more: bool,
    },

    /// Jump to the newest message.
    ScrollToLatest {
        /// Room.
        room_id: RoomId,
    },

    /// An attachment finished uploading.
    Uploaded {
        /// Room the attachment is for.
        room_id: RoomId,
        /// Attachment kind picked from the MIME type.
        kind: MessageKind,
        /// Where it is served from.
        file: UploadedFile,
    },

    /// Something failed.
    Error {
        /// Error description.
        message: String,
    },
}
