//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture what the App and Client expose at one point in time.
//! Invariants run on snapshots rather than live state, so a check is atomic
//! and a failing snapshot can be printed or stored as-is.

use roomline_app::{App, Bridge};
use roomline_client::Environment;
use roomline_proto::{MessageId, RoomId, UserId};
use serde::Serialize;

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Snapshot of one client's observable state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientSnapshot {
    /// Logged-in user.
    pub user_id: UserId,
    /// Whether the session is connected.
    pub connected: bool,
    /// Live subscriptions, by logical topic name.
    pub subscriptions: Vec<String>,
    /// Room the Client has open.
    pub open_room: Option<RoomId>,
    /// Room the App shows.
    pub shown_room: Option<RoomId>,
    /// Message ids of the Client's timeline.
    pub timeline: Vec<MessageId>,
    /// Message ids the App displays.
    pub view: Vec<MessageId>,
    /// Rooms with a cached live update.
    pub cached_rooms: Vec<RoomId>,
    /// Room ids of the displayed room list, in display order.
    pub room_list: Vec<RoomId>,
}

impl ClientSnapshot {
    /// Create an empty, disconnected snapshot for `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, ..Default::default() }
    }

    /// Snapshot of what the App alone exposes.
    ///
    /// The Client side reads as disconnected with nothing open.
    pub fn from_app(app: &App) -> Self {
        Self {
            shown_room: app.open_room(),
            view: app.room_view().messages.iter().map(|m| m.message_id).collect(),
            room_list: app.rooms().iter().map(|r| r.id).collect(),
            ..Default::default()
        }
    }

    /// Snapshot of a running App and its Bridge.
    pub fn from_runtime<E: Environment>(app: &App, bridge: &Bridge<E>) -> Self {
        let client = bridge.client();
        Self {
            user_id: bridge.user_id(),
            connected: client.is_connected(),
            subscriptions: client.subscribed_topics().iter().map(ToString::to_string).collect(),
            open_room: client.active_room(),
            timeline: client
                .timeline()
                .map(|t| t.messages().iter().map(|m| m.message_id).collect())
                .unwrap_or_default(),
            cached_rooms: client.room_updates().iter().map(|(id, _)| *id).collect(),
            ..Self::from_app(app)
        }
    }
}
