//! Protocol-to-Application translation layer.
//!
//! The [`Bridge`] wraps the [`roomline_client::Client`] and adapts it to the
//! application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::AppAction`]s into client events.
//! - Accumulates outgoing [`Packet`]s and [`IoRequest`]s for the driver to
//!   execute in the next I/O cycle. Packets go out before requests.
//! - Converts client actions back into [`crate::AppEvent`]s.
//! - Manages time ticks generically to support both real-time execution and
//!   deterministic simulation.

use std::sync::Arc;

use roomline_client::{
    ApiError, Client, ClientAction, ClientError, ClientEvent, CredentialStore, Environment,
    SessionConfig, TransportEvent,
};
use roomline_proto::{MessageId, Packet, RoomId, UserId, payloads::ChatMessage};

use crate::{AppAction, AppEvent};

/// I/O the driver performs on the bridge's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoRequest {
    /// Open the WebSocket and report back through
    /// [`Bridge::transport_opened`] or [`Bridge::transport_failed`].
    OpenTransport,
    /// Close the WebSocket.
    CloseTransport,
    /// Fetch a history page and report back through
    /// [`Bridge::history_loaded`].
    FetchHistory {
        /// Room to page.
        room_id: RoomId,
        /// Older than this id; `None` for the newest page.
        before: Option<MessageId>,
        /// Page size.
        size: usize,
    },
    /// Persist the last-read marker over REST. Failures are only logged.
    UpdateLastRead {
        /// Room the marker belongs to.
        room_id: RoomId,
        /// Highest message read.
        message_id: MessageId,
    },
}

/// Bridge between App and Client.
///
/// Generic over Environment to support both production and simulation.
pub struct Bridge<E: Environment> {
    client: Client<E>,
    user_id: UserId,
    outgoing: Vec<Packet>,
    requests: Vec<IoRequest>,
}

impl<E: Environment> Bridge<E> {
    /// Create a bridge for `user_id`.
    pub fn new(
        env: E,
        user_id: UserId,
        credentials: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Self {
        let client = Client::new(env, credentials, config);
        Self { client, user_id, outgoing: Vec::new(), requests: Vec::new() }
    }

    /// The logged-in user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The wrapped client, for inspection.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        let event = match action {
            AppAction::Connect => ClientEvent::Connect { user_id: self.user_id },
            AppAction::Disconnect => ClientEvent::Disconnect,
            AppAction::OpenRoom { room_id } => ClientEvent::OpenRoom { room_id },
            AppAction::CloseRoom => ClientEvent::CloseRoom,
            AppAction::LoadOlder { room_id } => ClientEvent::LoadOlder { room_id },
            AppAction::SendMessage { room_id, request } => {
                ClientEvent::SendMessage { room_id, request }
            },
            AppAction::Render
            | AppAction::Quit
            | AppAction::LoadRooms
            | AppAction::Upload { .. } => return vec![],
        };

        let result = self.client.handle(event);
        self.handle_client_result(result)
    }

    /// The transport requested by [`IoRequest::OpenTransport`] is open.
    pub fn transport_opened(&mut self) -> Vec<AppEvent> {
        let result = self.client.handle(ClientEvent::TransportOpened);
        self.handle_client_result(result)
    }

    /// The transport could not be opened.
    pub fn transport_failed(&mut self, reason: String) -> Vec<AppEvent> {
        let result = self.client.handle(ClientEvent::TransportClosed { reason });
        self.handle_client_result(result)
    }

    /// Something happened on the open transport.
    pub fn handle_transport(&mut self, event: TransportEvent) -> Vec<AppEvent> {
        let result = self.client.handle(event.into());
        self.handle_client_result(result)
    }

    /// A history page requested by [`IoRequest::FetchHistory`] arrived.
    pub fn history_loaded(
        &mut self,
        room_id: RoomId,
        before: Option<MessageId>,
        result: Result<Vec<ChatMessage>, ApiError>,
    ) -> Vec<AppEvent> {
        let event = match (result, before) {
            (Ok(messages), None) => ClientEvent::HistoryLoaded { room_id, messages },
            (Ok(messages), Some(_)) => ClientEvent::OlderHistoryLoaded { room_id, messages },
            (Err(e), _) => {
                tracing::warn!(room_id, error = %e, "history fetch failed");
                let result = self.client.handle(ClientEvent::HistoryFailed { room_id });
                let mut events = self.handle_client_result(result);
                events.push(AppEvent::Error { message: e.to_string() });
                return events;
            },
        };

        let result = self.client.handle(event);
        self.handle_client_result(result)
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: E::Instant) -> Vec<AppEvent> {
        let result = self.client.handle(ClientEvent::Tick { now });
        self.handle_client_result(result)
    }

    /// Take pending outgoing packets.
    pub fn take_outgoing(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outgoing)
    }

    /// Take pending I/O requests.
    pub fn take_requests(&mut self) -> Vec<IoRequest> {
        std::mem::take(&mut self.requests)
    }

    fn handle_client_result(
        &mut self,
        result: Result<Vec<ClientAction>, ClientError>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_client_actions(actions),
            Err(e) => vec![AppEvent::Error { message: e.to_string() }],
        }
    }

    fn process_client_actions(&mut self, actions: Vec<ClientAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for action in actions {
            match action {
                ClientAction::OpenTransport => {
                    self.requests.push(IoRequest::OpenTransport);
                    events.push(AppEvent::Connecting);
                },
                ClientAction::Send(packet) => self.outgoing.push(packet),
                ClientAction::CloseTransport => self.requests.push(IoRequest::CloseTransport),
                ClientAction::Connected => events.push(AppEvent::Connected),
                ClientAction::Disconnected { will_retry } => {
                    events.push(AppEvent::Disconnected { will_retry });
                },
                ClientAction::RoomUpdatesChanged(snapshot) => {
                    events.push(AppEvent::RoomUpdates(snapshot));
                },
                ClientAction::TimelineChanged { room_id } => {
                    if let Some(timeline) = self.client.timeline() {
                        events.push(AppEvent::TimelineChanged {
                            room_id,
                            messages: timeline.messages().to_vec(),
                            has_more: timeline.has_more(),
                        });
                    }
                },
                ClientAction::ScrollToLatest { room_id } => {
                    events.push(AppEvent::ScrollToLatest { room_id });
                },
                ClientAction::FetchHistory { room_id, before, size } => {
                    self.requests.push(IoRequest::FetchHistory { room_id, before, size });
                },
                ClientAction::UpdateLastRead { room_id, message_id } => {
                    self.requests.push(IoRequest::UpdateLastRead { room_id, message_id });
                },
                ClientAction::BrokerError { message } => {
                    events.push(AppEvent::Error { message });
                },
            }
        }

        events
    }
}
