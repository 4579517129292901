//! Client events and actions.

use roomline_core::CacheSnapshot;
use roomline_proto::{
    MessageId, Packet, RoomId, UserId,
    payloads::{ChatMessage, SendMessageRequest},
};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Moving packets between the client and the WebSocket
/// - Reporting transport open/close
/// - Driving time forward via ticks
/// - Fetching history pages over REST when asked to
/// - Forwarding user intents (open a room, send a message)
///
/// Generic over `I` (Instant type) so simulations can use virtual time.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Start the session for this user.
    Connect {
        /// The logged-in user; owner of the room-update topic.
        user_id: UserId,
    },

    /// Close the session and forget live state.
    Disconnect,

    /// The transport requested by [`ClientAction::OpenTransport`] is open.
    TransportOpened,

    /// The transport closed or could not be opened.
    TransportClosed {
        /// Human-readable cause.
        reason: String,
    },

    /// Packet received from the broker.
    PacketReceived(Packet),

    /// Time tick for heart-beats, timeouts and reconnects.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// The user opened a room. Any previously open room is closed.
    OpenRoom {
        /// Room to open.
        room_id: RoomId,
    },

    /// The user left the room view.
    CloseRoom,

    /// Newest history page for the open room arrived.
    HistoryLoaded {
        /// Room the page belongs to.
        room_id: RoomId,
        /// Messages, any order.
        messages: Vec<ChatMessage>,
    },

    /// The user scrolled to the top of the open room.
    LoadOlder {
        /// Room to page.
        room_id: RoomId,
    },

    /// Older history page arrived.
    OlderHistoryLoaded {
        /// Room the page belongs to.
        room_id: RoomId,
        /// Messages, any order.
        messages: Vec<ChatMessage>,
    },

    /// Publish a message to a room.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Message body.
        request: SendMessageRequest,
    },

    /// A requested history page could not be fetched.
    HistoryFailed {
        /// Room the page was for.
        room_id: RoomId,
    },

    /// Tell the room the user has read up to `message_id`.
    MarkRead {
        /// Target room.
        room_id: RoomId,
        /// Highest message read.
        message_id: MessageId,
    },
}

/// What the WebSocket task observed.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A packet from the broker.
    Packet(Packet),
    /// The socket closed. No further events follow.
    Closed(String),
}

impl<I> From<TransportEvent> for ClientEvent<I> {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Packet(packet) => Self::PacketReceived(packet),
            TransportEvent::Closed(reason) => Self::TransportClosed { reason },
        }
    }
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone)]
pub enum ClientAction {
    /// Open the WebSocket, then feed [`ClientEvent::TransportOpened`] or
    /// [`ClientEvent::TransportClosed`].
    OpenTransport,

    /// Send a packet on the WebSocket.
    Send(Packet),

    /// Close the WebSocket.
    CloseTransport,

    /// Session established. Subscriptions have been (re)issued.
    Connected,

    /// Session lost or closed.
    Disconnected {
        /// Whether a reconnect is scheduled.
        will_retry: bool,
    },

    /// The room-update cache changed; recompose the room list.
    RoomUpdatesChanged(CacheSnapshot),

    /// The open room's timeline changed.
    TimelineChanged {
        /// Room whose timeline changed.
        room_id: RoomId,
    },

    /// Scroll the open room to its newest message.
    ScrollToLatest {
        /// Room to scroll.
        room_id: RoomId,
    },

    /// Fetch a history page over REST and feed it back as
    /// [`ClientEvent::HistoryLoaded`] (no cursor) or
    /// [`ClientEvent::OlderHistoryLoaded`].
    FetchHistory {
        /// Room to page.
        room_id: RoomId,
        /// Return messages older than this id.
        before: Option<MessageId>,
        /// Page size.
        size: usize,
    },

    /// Persist the user's last-read marker over REST. Emitted next to every
    /// read receipt published on the socket.
    UpdateLastRead {
        /// Room the marker belongs to.
        room_id: RoomId,
        /// Highest message read.
        message_id: MessageId,
    },

    /// The broker reported an error on the live connection.
    BrokerError {
        /// Broker's message.
        message: String,
    },
}
