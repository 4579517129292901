//! Application state machine.
//!
//! [`App`] manages what the user sees, decoupled from I/O and protocol
//! mechanics. It consumes [`crate::AppEvent`] inputs and produces
//! [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Navigation between the room list and one open room
//! - The REST room-list baseline and the live update snapshot it is merged
//!   with for display
//! - The open room's timeline as last reported by the client
//! - High-level connection state and a transient status line

use roomline_core::{CacheSnapshot, compose};
use roomline_proto::{
    RoomId,
    payloads::{RoomSummary, SendMessageRequest},
};

use crate::{AppAction, AppEvent, ConnectionState, RoomView, Screen, UserInput};

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies, fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App {
    state: ConnectionState,
    screen: Screen,
    /// Room list as last fetched over REST.
    baseline: Vec<RoomSummary>,
    /// Live updates to merge over the baseline.
    updates: CacheSnapshot,
    /// Open room's timeline. Empty on the room list.
    view: RoomView,
    status_message: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create an App showing an empty room list.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            screen: Screen::RoomList,
            baseline: Vec::new(),
            updates: CacheSnapshot::default(),
            view: RoomView::default(),
            status_message: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Input(input) => self.handle_input(input),
            AppEvent::Tick => vec![],
            AppEvent::Connecting => {
                self.state = ConnectionState::Connecting;
                vec![AppAction::Render]
            },
            AppEvent::Connected => {
                self.state = ConnectionState::Connected;
                self.status_message = None;
                vec![AppAction::Render]
            },
            AppEvent::Disconnected { will_retry } => {
                self.state = if will_retry {
                    ConnectionState::Reconnecting
                } else {
                    ConnectionState::Disconnected
                };
                vec![AppAction::Render]
            },
            AppEvent::RoomsLoaded(rooms) => {
                self.baseline = rooms;
                vec![AppAction::Render]
            },
            AppEvent::RoomUpdates(snapshot) => {
                self.updates = snapshot;
                if self.screen == Screen::RoomList { vec![AppAction::Render] } else { vec![] }
            },
            AppEvent::TimelineChanged { room_id, messages, has_more } => {
                if self.open_room() != Some(room_id) {
                    return vec![];
                }
                self.view.messages = messages;
                self.view.has_more = has_more;
                vec![AppAction::Render]
            },
            AppEvent::ScrollToLatest { room_id } => {
                if self.open_room() != Some(room_id) {
                    return vec![];
                }
                self.view.follow_latest = true;
                vec![AppAction::Render]
            },
            AppEvent::Uploaded { room_id, kind, file } => {
                if self.state != ConnectionState::Connected {
                    let status = format!("Not connected, {} not sent", file.file_name);
                    self.status_message = Some(status);
                    return vec![AppAction::Render];
                }
                let request = SendMessageRequest::attachment(kind, file.url, file.file_name);
                vec![AppAction::SendMessage { room_id, request }]
            },
            AppEvent::Error { message } => {
                self.status_message = Some(format!("Error: {message}"));
                vec![AppAction::Render]
            },
        }
    }

    fn handle_input(&mut self, input: UserInput) -> Vec<AppAction> {
        match (input, self.screen) {
            (UserInput::Quit, _) => self.quit(),
            (UserInput::Open(room_id), _) => self.open(room_id),
            (UserInput::Refresh, _) => vec![AppAction::LoadRooms],
            (UserInput::Back, Screen::Room { .. }) => self.back(),
            (UserInput::Text(_) | UserInput::File(_), Screen::Room { .. })
                if self.state != ConnectionState::Connected =>
            {
                self.status_message = Some("Not connected".into());
                vec![AppAction::Render]
            },
            (UserInput::Text(text), Screen::Room { room_id }) => {
                vec![AppAction::SendMessage { room_id, request: SendMessageRequest::text(text) }]
            },
            (UserInput::File(path), Screen::Room { room_id }) => {
                self.status_message = Some(format!("Uploading {}...", path.display()));
                vec![AppAction::Upload { room_id, path }, AppAction::Render]
            },
            (UserInput::More, Screen::Room { room_id }) => {
                if self.view.has_more {
                    vec![AppAction::LoadOlder { room_id }]
                } else {
                    self.status_message = Some("No older messages".into());
                    vec![AppAction::Render]
                }
            },
            (
                UserInput::Back | UserInput::Text(_) | UserInput::File(_) | UserInput::More,
                Screen::RoomList,
            ) => {
                self.status_message = Some("Open a room first".into());
                vec![AppAction::Render]
            },
        }
    }

    /// Start the session and fetch the room list.
    pub fn connect(&mut self) -> Vec<AppAction> {
        self.state = ConnectionState::Connecting;
        vec![AppAction::Connect, AppAction::LoadRooms, AppAction::Render]
    }

    /// Open `room_id`, closing any open room.
    pub fn open(&mut self, room_id: RoomId) -> Vec<AppAction> {
        if self.open_room() == Some(room_id) {
            return vec![];
        }

        self.screen = Screen::Room { room_id };
        self.view = RoomView::default();
        self.status_message = None;
        vec![AppAction::OpenRoom { room_id }, AppAction::Render]
    }

    /// Return to the room list and refresh it.
    pub fn back(&mut self) -> Vec<AppAction> {
        if self.screen == Screen::RoomList {
            return vec![];
        }

        self.screen = Screen::RoomList;
        self.view = RoomView::default();
        vec![AppAction::CloseRoom, AppAction::LoadRooms, AppAction::Render]
    }

    /// Quit the application.
    pub fn quit(&self) -> Vec<AppAction> {
        vec![AppAction::Disconnect, AppAction::Quit]
    }

    /// Set a status message to display to the user.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Mark the jump to the newest message as done.
    pub fn clear_follow(&mut self) {
        self.view.follow_latest = false;
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Current screen.
    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// The open room, if any.
    pub fn open_room(&self) -> Option<RoomId> {
        match self.screen {
            Screen::Room { room_id } => Some(room_id),
            Screen::RoomList => None,
        }
    }

    /// Room list for display: REST baseline merged with live updates.
    pub fn rooms(&self) -> Vec<RoomSummary> {
        compose::compose_room_list(&self.baseline, &self.updates)
    }

    /// Unread messages across all rooms.
    pub fn total_unread(&self) -> u64 {
        compose::total_unread(&self.rooms())
    }

    /// The open room's timeline.
    pub fn room_view(&self) -> &RoomView {
        &self.view
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDateTime;
    use roomline_proto::payloads::{MessageKind, RoomKind, UploadedFile};

    use super::*;

    fn summary(id: RoomId) -> RoomSummary {
        RoomSummary {
            id,
            name: format!("room {id}"),
            kind: RoomKind::Group,
            member_count: 2,
            last_message_preview: None,
            last_sender: None,
            last_message_time: NaiveDateTime::default(),
            unread_count: 1,
        }
    }

    #[test]
    fn connect_fetches_rooms() {
        let mut app = App::new();
        let actions = app.connect();

        assert_eq!(actions, vec![AppAction::Connect, AppAction::LoadRooms, AppAction::Render]);
        assert_eq!(app.connection_state(), ConnectionState::Connecting);
    }

    #[test]
    fn open_then_back() {
        let mut app = App::new();

        assert_eq!(app.handle(AppEvent::Input(UserInput::Open(3))), vec![
            AppAction::OpenRoom { room_id: 3 },
            AppAction::Render
        ]);
        assert_eq!(app.open_room(), Some(3));

        assert_eq!(app.handle(AppEvent::Input(UserInput::Back)), vec![
            AppAction::CloseRoom,
            AppAction::LoadRooms,
            AppAction::Render
        ]);
        assert_eq!(app.screen(), Screen::RoomList);
    }

    #[test]
    fn reopening_open_room_does_nothing() {
        let mut app = App::new();
        app.open(3);
        assert!(app.open(3).is_empty());
    }

    #[test]
    fn text_goes_to_open_room_only() {
        let mut app = App::new();

        let actions = app.handle(AppEvent::Input(UserInput::Text("hi".into())));
        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.status_message(), Some("Open a room first"));

        app.handle(AppEvent::Connected);
        app.open(5);
        let actions = app.handle(AppEvent::Input(UserInput::Text("hi".into())));
        assert_eq!(actions, vec![AppAction::SendMessage {
            room_id: 5,
            request: SendMessageRequest::text("hi")
        }]);
    }

    #[test]
    fn sends_are_refused_while_not_connected() {
        let mut app = App::new();
        app.open(5);
        app.handle(AppEvent::Connected);
        app.handle(AppEvent::Disconnected { will_retry: true });

        let actions = app.handle(AppEvent::Input(UserInput::Text("hi".into())));
        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.status_message(), Some("Not connected"));

        let actions = app.handle(AppEvent::Input(UserInput::File(PathBuf::from("a.png"))));
        assert_eq!(actions, vec![AppAction::Render]);

        let actions = app.handle(AppEvent::Uploaded {
            room_id: 5,
            kind: MessageKind::Image,
            file: UploadedFile { url: "https://f/a.png".into(), file_name: "a.png".into() },
        });
        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.status_message(), Some("Not connected, a.png not sent"));
    }

    #[test]
    fn timeline_for_other_room_is_ignored() {
        let mut app = App::new();
        app.open(5);

        let actions = app.handle(AppEvent::TimelineChanged {
            room_id: 6,
            messages: Vec::new(),
            has_more: true,
        });
        assert!(actions.is_empty());
        assert!(!app.room_view().has_more);
    }

    #[test]
    fn more_only_when_history_remains() {
        let mut app = App::new();
        app.open(5);

        assert_eq!(app.handle(AppEvent::Input(UserInput::More)), vec![AppAction::Render]);

        app.handle(AppEvent::TimelineChanged { room_id: 5, messages: Vec::new(), has_more: true });
        assert_eq!(app.handle(AppEvent::Input(UserInput::More)), vec![AppAction::LoadOlder {
            room_id: 5
        }]);
    }

    #[test]
    fn upload_becomes_attachment() {
        let mut app = App::new();
        app.handle(AppEvent::Connected);
        app.open(5);

        let actions = app.handle(AppEvent::Input(UserInput::File(PathBuf::from("a.png"))));
        assert_eq!(actions[0], AppAction::Upload { room_id: 5, path: PathBuf::from("a.png") });

        let actions = app.handle(AppEvent::Uploaded {
            room_id: 5,
            kind: MessageKind::Image,
            file: UploadedFile { url: "https://f/a.png".into(), file_name: "a.png".into() },
        });
        assert_eq!(actions, vec![AppAction::SendMessage {
            room_id: 5,
            request: SendMessageRequest::attachment(MessageKind::Image, "https://f/a.png", "a.png")
        }]);
    }

    #[test]
    fn room_list_merges_updates() {
        let mut app = App::new();
        app.handle(AppEvent::RoomsLoaded(vec![summary(1), summary(2)]));

        assert_eq!(app.rooms().len(), 2);
        assert_eq!(app.total_unread(), 2);
    }

    #[test]
    fn reconnect_state() {
        let mut app = App::new();
        app.handle(AppEvent::Connected);
        app.handle(AppEvent::Disconnected { will_retry: true });
        assert_eq!(app.connection_state(), ConnectionState::Reconnecting);

        app.handle(AppEvent::Disconnected { will_retry: false });
        assert_eq!(app.connection_state(), ConnectionState::Disconnected);
    }
}
