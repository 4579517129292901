//! Line-oriented rendering.
//!
//! A terminal that only appends cannot redraw, so [`Renderer`] remembers what
//! it already printed and emits only what changed: the connection state, the
//! room list when any line of it differs, new messages of the open room and a
//! new status line.

use std::collections::BTreeSet;

use roomline_app::{App, ConnectionState, Screen, message_line};
use roomline_proto::{
    MessageId, RoomId,
    payloads::{Friend, FriendRequest, FriendRequestStatus, RoomSummary, User},
};

/// Incremental renderer for one session.
#[derive(Debug, Default)]
pub struct Renderer {
    connection: Option<ConnectionState>,
    status: Option<String>,
    /// Room list as last printed. `None` until printed on this screen.
    room_list: Option<Vec<String>>,
    room: Option<RoomId>,
    printed: BTreeSet<MessageId>,
}

impl Renderer {
    /// Create a renderer that has printed nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for the current state of `app`.
    pub fn render(&mut self, app: &App) -> Vec<String> {
        let mut lines = Vec::new();

        let state = app.connection_state();
        if self.connection != Some(state) {
            self.connection = Some(state);
            lines.push(format!("-- {} --", connection_label(state)));
        }

        match app.screen() {
            Screen::RoomList => self.render_room_list(app, &mut lines),
            Screen::Room { room_id } => self.render_room(app, room_id, &mut lines),
        }

        let status = app.status_message().map(str::to_string);
        if status != self.status {
            if let Some(status) = &status {
                lines.push(format!("! {status}"));
            }
            self.status = status;
        }

        lines
    }

    fn render_room_list(&mut self, app: &App, lines: &mut Vec<String>) {
        if self.room.take().is_some() {
            self.printed.clear();
            self.room_list = None;
        }

        let rooms: Vec<String> = app.rooms().iter().map(room_line).collect();
        if self.room_list.as_ref() == Some(&rooms) {
            return;
        }

        lines.push(format!("Rooms ({} unread)", app.total_unread()));
        if rooms.is_empty() {
            lines.push("  (no rooms)".to_string());
        }
        lines.extend(rooms.iter().map(|line| format!("  {line}")));
        self.room_list = Some(rooms);
    }

    fn render_room(&mut self, app: &App, room_id: RoomId, lines: &mut Vec<String>) {
        if self.room != Some(room_id) {
            self.room = Some(room_id);
            self.room_list = None;
            self.printed.clear();

            let name = app
                .rooms()
                .into_iter()
                .find(|r| r.id == room_id)
                .map_or_else(|| format!("room {room_id}"), |r| r.name);
            lines.push(format!("== {name} == (/more, /file <path>, /back, /quit)"));
        }

        let view = app.room_view();
        let fresh: Vec<_> =
            view.messages.iter().filter(|m| !self.printed.contains(&m.message_id)).collect();

        // An older page lands above what is already on screen
        let oldest_printed = self.printed.first().copied();
        if fresh.first().zip(oldest_printed).is_some_and(|(m, oldest)| m.message_id < oldest) {
            lines.push("-- older --".to_string());
        }

        for message in fresh {
            lines.push(message_line(message));
            self.printed.insert(message.message_id);
        }
    }
}

fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "offline",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Reconnecting => "reconnecting",
        ConnectionState::Connected => "connected",
    }
}

/// One-line rendering of a room list entry.
pub fn room_line(room: &RoomSummary) -> String {
    let last = match (&room.last_sender, &room.last_message_preview) {
        (Some(sender), Some(preview)) => format!(" - {sender}: {preview}"),
        (None, Some(preview)) => format!(" - {preview}"),
        (_, None) => String::new(),
    };
    let unread = if room.unread_count > 0 {
        format!(" [{} unread]", room.unread_count)
    } else {
        String::new()
    };

    format!("#{} {} ({} members){last}{unread}", room.id, room.name, room.member_count)
}

/// One-line rendering of a user.
pub fn user_line(user: &User) -> String {
    let code = user.friend_code.as_deref().unwrap_or("-");
    format!("{} <{}> id {}, friend code {code}", user.nickname, user.email, user.id)
}

/// One-line rendering of a friend.
pub fn friend_line(friend: &Friend) -> String {
    format!(
        "{} {} <{}> since {}",
        friend.id,
        friend.nickname,
        friend.email,
        friend.friend_since.date()
    )
}

/// One-line rendering of a friend request.
pub fn request_line(request: &FriendRequest) -> String {
    let status = match request.status {
        FriendRequestStatus::Pending => "pending",
        FriendRequestStatus::Accepted => "accepted",
        FriendRequestStatus::Rejected => "rejected",
    };
    format!("#{} {} <{}> {status}", request.id, request.requester.nickname, request.requester.email)
}
