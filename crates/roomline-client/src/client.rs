//! Client state machine.
//!
//! The `Client` composes the core components into one event/action contract:
//! the transport session (with its subscription registry), the room-update
//! cache and the timeline of the open room. It decides which topics should be
//! live and reconciles the registry against that whenever the connection comes
//! up or the user navigates.
//!
//! # Hand-off
//!
//! Opening a room subscribes its message and read-status topics with receipts.
//! The room's entry in the update cache is cleared only once both receipts
//! have arrived, so no push can fall between the room list and the room view.

use std::sync::Arc;

use roomline_core::{
    CacheSnapshot, DisconnectReason, Environment, PAGE_SIZE, RoomTimeline, RoomUpdateCache,
    SessionAction, SessionConfig, SessionState, TimelineEffect, TransportSession, compose,
};
use roomline_proto::{
    Frame, MessageId, RoomId, Topic, UserId,
    payloads::{
        ChatMessage, ReadReceipt, ReadStatusEvent, RoomSummary, RoomUpdate, SendMessageRequest,
    },
};

use crate::{
    credentials::CredentialStore,
    error::ClientError,
    event::{ClientAction, ClientEvent},
};

/// Handler routed with each delivered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inbound {
    RoomUpdates,
    Messages(RoomId),
    ReadStatus(RoomId),
}

impl Inbound {
    fn for_topic(topic: Topic) -> Self {
        match topic {
            Topic::UserRooms(_) => Self::RoomUpdates,
            Topic::RoomMessages(room) => Self::Messages(room),
            Topic::RoomReadStatus(room) => Self::ReadStatus(room),
        }
    }
}

/// The room the user is looking at.
#[derive(Debug, Clone)]
struct ActiveRoom {
    timeline: RoomTimeline,
    handed_off: bool,
    fetching_older: bool,
}

/// Chat client.
pub struct Client<E: Environment> {
    env: E,
    credentials: Arc<dyn CredentialStore>,
    user_id: Option<UserId>,
    session: TransportSession<Inbound, E::Instant>,
    cache: RoomUpdateCache,
    active: Option<ActiveRoom>,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client.
    pub fn new(env: E, credentials: Arc<dyn CredentialStore>, config: SessionConfig) -> Self {
        Self {
            env,
            credentials,
            user_id: None,
            session: TransportSession::new(config),
            cache: RoomUpdateCache::new(),
            active: None,
        }
    }

    /// Connection state.
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether the session is connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// The connected user, once `Connect` was handled.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Topics with a live subscription.
    pub fn subscribed_topics(&self) -> Vec<Topic> {
        self.session.registry().topics().collect()
    }

    /// Whether the broker confirmed the subscription to `topic`.
    pub fn is_confirmed(&self, topic: Topic) -> bool {
        self.session.registry().is_confirmed(topic)
    }

    /// Current room-update cache.
    pub fn room_updates(&self) -> CacheSnapshot {
        self.cache.snapshot()
    }

    /// Room list for display: `baseline` merged with live updates.
    pub fn room_list(&self, baseline: &[RoomSummary]) -> Vec<RoomSummary> {
        compose::compose_room_list(baseline, &self.cache.snapshot())
    }

    /// The open room.
    pub fn active_room(&self) -> Option<RoomId> {
        self.active.as_ref().map(|a| a.timeline.room_id())
    }

    /// Timeline of the open room.
    pub fn timeline(&self) -> Option<&RoomTimeline> {
        self.active.as_ref().map(|a| &a.timeline)
    }

    /// Process an event.
    ///
    /// # Errors
    ///
    /// - `ClientError::Session` for frames the session cannot accept in its
    ///   current state, or a failing publish
    /// - `ClientError::NoIdentity` for `OpenRoom` before `Connect`
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Connect { user_id } => Ok(self.handle_connect(user_id)),
            ClientEvent::Disconnect => {
                let actions = self.session.disconnect(self.env.now());
                Ok(self.process(actions))
            },
            ClientEvent::TransportOpened => self.handle_transport_opened(),
            ClientEvent::TransportClosed { reason } => {
                let actions = self.session.transport_closed(self.env.now(), &reason);
                Ok(self.process(actions))
            },
            ClientEvent::PacketReceived(packet) => {
                let actions = self.session.handle_packet(self.env.now(), packet)?;
                Ok(self.process(actions))
            },
            ClientEvent::Tick { now } => {
                let actions = self.session.tick(now);
                Ok(self.process(actions))
            },
            ClientEvent::OpenRoom { room_id } => self.handle_open_room(room_id),
            ClientEvent::CloseRoom => Ok(self.handle_close_room()),
            ClientEvent::HistoryLoaded { room_id, messages } => {
                self.handle_history(room_id, messages)
            },
            ClientEvent::LoadOlder { room_id } => Ok(self.handle_load_older(room_id)),
            ClientEvent::OlderHistoryLoaded { room_id, messages } => {
                Ok(self.handle_older_history(room_id, messages))
            },
            ClientEvent::HistoryFailed { room_id } => {
                if let Some(active) = self.active_mut(room_id) {
                    active.fetching_older = false;
                }
                Ok(Vec::new())
            },
            ClientEvent::SendMessage { room_id, request } => {
                self.handle_send_message(room_id, &request)
            },
            ClientEvent::MarkRead { room_id, message_id } => self.publish_read(room_id, message_id),
        }
    }

    fn handle_connect(&mut self, user_id: UserId) -> Vec<ClientAction> {
        if self.user_id.is_some_and(|current| current != user_id) {
            tracing::debug!(user_id, "switching user");
            self.cache.clear_all();
            self.active = None;
        }
        self.user_id = Some(user_id);

        let actions = self.session.connect(self.env.now());
        self.process(actions)
    }

    fn handle_transport_opened(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let token = match self.credentials.access_token() {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(error = %err, "cannot read access token, dropping transport");
                let reason = format!("credential error: {err}");
                let actions = self.session.transport_closed(self.env.now(), &reason);
                let mut out = vec![ClientAction::CloseTransport];
                out.extend(self.process(actions));
                return Ok(out);
            },
        };
        if token.is_none() {
            tracing::warn!("no access token stored; handshake will be rejected");
        }

        let actions = self.session.transport_opened(self.env.now(), token.as_deref())?;
        Ok(self.process(actions))
    }

    fn handle_open_room(&mut self, room_id: RoomId) -> Result<Vec<ClientAction>, ClientError> {
        let Some(viewer) = self.user_id else {
            return Err(ClientError::NoIdentity { operation: "open a room" });
        };

        if self.active_room() == Some(room_id) {
            return Ok(Vec::new());
        }

        let mut actions = self.handle_close_room();

        self.active = Some(ActiveRoom {
            timeline: RoomTimeline::new(room_id, viewer),
            handed_off: false,
            fetching_older: false,
        });

        let now = self.env.now();
        let mut session_actions = Vec::new();
        for topic in Topic::room_topics(room_id) {
            session_actions.extend(self.session.subscribe(now, topic, Inbound::for_topic(topic)));
        }
        actions.extend(self.process(session_actions));

        actions.push(ClientAction::FetchHistory { room_id, before: None, size: PAGE_SIZE });
        actions.push(ClientAction::TimelineChanged { room_id });
        Ok(actions)
    }

    fn handle_close_room(&mut self) -> Vec<ClientAction> {
        let Some(active) = self.active.take() else {
            return Vec::new();
        };

        let now = self.env.now();
        let mut session_actions = Vec::new();
        for topic in Topic::room_topics(active.timeline.room_id()) {
            session_actions.extend(self.session.unsubscribe(now, topic));
        }
        self.process(session_actions)
    }

    fn handle_history(
        &mut self,
        room_id: RoomId,
        messages: Vec<ChatMessage>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let Some(active) = self.active_mut(room_id) else {
            tracing::debug!(room_id, "dropping history for a room that is not open");
            return Ok(Vec::new());
        };

        active.timeline.load_initial(messages);
        let latest = active.timeline.latest_id();

        let mut actions = vec![
            ClientAction::TimelineChanged { room_id },
            ClientAction::ScrollToLatest { room_id },
        ];
        if let Some(latest) = latest {
            actions.extend(self.publish_read(room_id, latest)?);
        }
        Ok(actions)
    }

    fn handle_load_older(&mut self, room_id: RoomId) -> Vec<ClientAction> {
        let Some(active) = self.active_mut(room_id) else {
            return Vec::new();
        };

        let timeline = &active.timeline;
        if active.fetching_older || !timeline.is_loaded() || !timeline.has_more() {
            return Vec::new();
        }

        let Some(before) = timeline.oldest_id() else {
            return Vec::new();
        };

        active.fetching_older = true;
        vec![ClientAction::FetchHistory { room_id, before: Some(before), size: PAGE_SIZE }]
    }

    fn handle_older_history(
        &mut self,
        room_id: RoomId,
        messages: Vec<ChatMessage>,
    ) -> Vec<ClientAction> {
        let Some(active) = self.active_mut(room_id) else {
            tracing::debug!(room_id, "dropping older history for a room that is not open");
            return Vec::new();
        };

        active.fetching_older = false;
        let inserted = active.timeline.prepend_older(messages);
        tracing::debug!(room_id, inserted, "older history loaded");

        vec![ClientAction::TimelineChanged { room_id }]
    }

    fn handle_send_message(
        &mut self,
        room_id: RoomId,
        request: &SendMessageRequest,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let actions = self.session.publish(self.env.now(), Topic::RoomMessages(room_id), request)?;
        Ok(self.process(actions))
    }

    fn publish_read(
        &mut self,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let receipt = ReadReceipt { message_id };
        let actions =
            self.session.publish(self.env.now(), Topic::RoomReadStatus(room_id), &receipt)?;

        let mut out = self.process(actions);
        out.push(ClientAction::UpdateLastRead { room_id, message_id });
        Ok(out)
    }

    /// Translate session actions, reacting to the notifications.
    fn process(&mut self, actions: Vec<SessionAction<Inbound>>) -> Vec<ClientAction> {
        let mut out = Vec::with_capacity(actions.len());

        for action in actions {
            match action {
                SessionAction::OpenTransport => out.push(ClientAction::OpenTransport),
                SessionAction::SendPacket(packet) => out.push(ClientAction::Send(packet)),
                SessionAction::CloseTransport => out.push(ClientAction::CloseTransport),
                SessionAction::Connected => {
                    out.push(ClientAction::Connected);
                    out.extend(self.reconcile());
                },
                SessionAction::Disconnected { reason, will_retry } => {
                    out.extend(self.on_disconnected(&reason));
                    out.push(ClientAction::Disconnected { will_retry });
                },
                SessionAction::Deliver { topic, handler, frame } => {
                    out.extend(self.on_deliver(topic, handler, &frame));
                },
                SessionAction::Receipt { topic: Some(topic), .. } => {
                    out.extend(self.on_confirmed(topic));
                },
                SessionAction::Receipt { topic: None, receipt_id } => {
                    tracing::debug!(%receipt_id, "receipt for no subscription");
                },
                SessionAction::BrokerError { message } => {
                    out.push(ClientAction::BrokerError { message });
                },
            }
        }

        out
    }

    /// Subscribe every topic that should be live: the user's room feed and
    /// the open room's topics.
    fn reconcile(&mut self) -> Vec<ClientAction> {
        let mut wanted = Vec::new();
        if let Some(user_id) = self.user_id {
            wanted.push(Topic::UserRooms(user_id));
        }
        if let Some(active) = &mut self.active {
            active.handed_off = false;
            wanted.extend(Topic::room_topics(active.timeline.room_id()));
        }

        let now = self.env.now();
        let mut session_actions = Vec::new();
        for topic in wanted {
            session_actions.extend(self.session.subscribe(now, topic, Inbound::for_topic(topic)));
        }
        self.process(session_actions)
    }

    fn on_disconnected(&mut self, reason: &DisconnectReason) -> Vec<ClientAction> {
        match reason {
            DisconnectReason::Requested => {
                self.active = None;
                if self.cache.clear_all() {
                    vec![ClientAction::RoomUpdatesChanged(self.cache.snapshot())]
                } else {
                    Vec::new()
                }
            },
            DisconnectReason::Failed(err) => {
                tracing::debug!(error = %err, "keeping cached state across reconnect");
                Vec::new()
            },
        }
    }

    fn on_deliver(&mut self, topic: Topic, handler: Inbound, frame: &Frame) -> Vec<ClientAction> {
        match handler {
            Inbound::RoomUpdates => match frame.json::<RoomUpdate>() {
                Ok(update) => {
                    let room_id = update.room_id;
                    if self.cache.upsert(update) {
                        tracing::debug!(room_id, "room update");
                        vec![ClientAction::RoomUpdatesChanged(self.cache.snapshot())]
                    } else {
                        Vec::new()
                    }
                },
                Err(err) => {
                    tracing::error!(%topic, error = %err, "undecodable room update");
                    Vec::new()
                },
            },
            Inbound::Messages(room_id) => match frame.json::<ChatMessage>() {
                Ok(message) => self.on_message(room_id, message),
                Err(err) => {
                    tracing::error!(%topic, error = %err, "undecodable chat message");
                    Vec::new()
                },
            },
            Inbound::ReadStatus(room_id) => match frame.json::<ReadStatusEvent>() {
                Ok(event) => self.on_read_status(room_id, event),
                Err(err) => {
                    tracing::error!(%topic, error = %err, "undecodable read status");
                    Vec::new()
                },
            },
        }
    }

    fn on_message(&mut self, room_id: RoomId, message: ChatMessage) -> Vec<ClientAction> {
        let Some(active) = self.active_mut(room_id) else {
            tracing::debug!(room_id, "message for a room that is not open");
            return Vec::new();
        };

        let before = active.timeline.messages().len();
        let effects = active.timeline.append_pushed(message);
        let changed = active.timeline.messages().len() != before;

        let mut actions = Vec::new();
        if changed {
            actions.push(ClientAction::TimelineChanged { room_id });
        }

        for effect in effects {
            match effect {
                TimelineEffect::ScrollToLatest => {
                    actions.push(ClientAction::ScrollToLatest { room_id });
                },
                TimelineEffect::MarkRead(message_id) => {
                    match self.publish_read(room_id, message_id) {
                        Ok(sent) => actions.extend(sent),
                        Err(err) => tracing::warn!(error = %err, "could not mark read"),
                    }
                },
            }
        }

        actions
    }

    fn on_read_status(&mut self, room_id: RoomId, event: ReadStatusEvent) -> Vec<ClientAction> {
        let Some(active) = self.active_mut(room_id) else {
            return Vec::new();
        };

        if active.timeline.apply_read_status(event) > 0 {
            vec![ClientAction::TimelineChanged { room_id }]
        } else {
            Vec::new()
        }
    }

    fn on_confirmed(&mut self, topic: Topic) -> Vec<ClientAction> {
        let Some(room_id) = topic.room_id() else {
            return Vec::new();
        };

        let registry = self.session.registry();
        let confirmed = Topic::room_topics(room_id).into_iter().all(|t| registry.is_confirmed(t));

        let Some(active) = self.active_mut(room_id) else {
            return Vec::new();
        };
        if !confirmed || active.handed_off {
            return Vec::new();
        }
        active.handed_off = true;

        tracing::debug!(room_id, "room subscriptions confirmed, clearing cached update");
        if self.cache.clear(room_id) {
            vec![ClientAction::RoomUpdatesChanged(self.cache.snapshot())]
        } else {
            Vec::new()
        }
    }

    fn active_mut(&mut self, room_id: RoomId) -> Option<&mut ActiveRoom> {
        self.active.as_mut().filter(|a| a.timeline.room_id() == room_id)
    }
}
