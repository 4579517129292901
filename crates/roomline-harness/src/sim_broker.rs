//! In-memory STOMP broker for simulation.
//!
//! `SimBroker` plays the server side of the chat protocol: it authenticates
//! the `CONNECT` bearer token, tracks subscriptions per connection, answers
//! receipts, stores messages and fans pushes out to subscribers. It also
//! serves the REST views (room list, history pages) from the same state, so
//! a simulated client sees one consistent world over both channels.
//!
//! The broker is passive. Frames go in through [`SimBroker::receive`] and
//! responses queue per connection until [`SimBroker::take_event`] drains
//! them. Tests inject server-side activity (other users posting, dropped
//! connections) by calling its methods directly.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use roomline_client::TransportEvent;
use roomline_proto::{
    Command, Frame, HeartBeat, MessageId, Packet, RoomId, Topic, UserId, headers,
    payloads::{
        ChatMessage, ChatRoom, CreateRoomRequest, MessageBody, ReadReceipt, ReadStatusEvent,
        RoomKind, RoomSummary, RoomUpdate, SendMessageRequest, User,
    },
};
use serde::Serialize;

/// Identifies one transport connection to the broker.
pub type ConnectionId = u64;

/// Broker shared between a driver and the test that scripts it.
pub type SharedSimBroker = Arc<Mutex<SimBroker>>;

/// Wrap a broker for sharing.
pub fn create_shared_broker(broker: SimBroker) -> SharedSimBroker {
    Arc::new(Mutex::new(broker))
}

/// Lock a shared broker.
///
/// A panic while the lock was held leaves the broker usable; its state is
/// plain data.
pub fn lock_broker(broker: &SharedSimBroker) -> MutexGuard<'_, SimBroker> {
    broker.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Connection {
    /// Authenticated user. `None` until `CONNECT` succeeds.
    user_id: Option<UserId>,
    /// Subscription id to topic.
    subscriptions: BTreeMap<String, Topic>,
    outbound: VecDeque<TransportEvent>,
    open: bool,
}

#[derive(Debug)]
struct SimUser {
    nickname: String,
    token: String,
}

#[derive(Debug)]
struct SimRoom {
    name: String,
    kind: RoomKind,
    created_at: NaiveDateTime,
    members: BTreeSet<UserId>,
    messages: Vec<ChatMessage>,
    /// Highest message each member has read.
    read_marks: HashMap<UserId, MessageId>,
    /// Last-read markers persisted over REST.
    last_read: HashMap<UserId, MessageId>,
}

/// In-memory STOMP broker and REST backend.
#[derive(Debug)]
pub struct SimBroker {
    users: BTreeMap<UserId, SimUser>,
    rooms: BTreeMap<RoomId, SimRoom>,
    connections: BTreeMap<ConnectionId, Connection>,
    /// Every frame received, in arrival order.
    received: Vec<(ConnectionId, Frame)>,
    next_connection: ConnectionId,
    next_message_id: MessageId,
    next_delivery: u64,
    heart_beat: HeartBeat,
    refuse_connections: bool,
}

impl Default for SimBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBroker {
    /// Create an empty broker that does not send heart-beats.
    pub fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            rooms: BTreeMap::new(),
            connections: BTreeMap::new(),
            received: Vec::new(),
            next_connection: 1,
            next_message_id: 1,
            next_delivery: 1,
            heart_beat: HeartBeat::DISABLED,
            refuse_connections: false,
        }
    }

    /// Heart-beat header sent in `CONNECTED`.
    #[must_use]
    pub fn with_heart_beat(mut self, heart_beat: HeartBeat) -> Self {
        self.heart_beat = heart_beat;
        self
    }

    /// Register a user who authenticates with `token`.
    pub fn add_user(&mut self, user_id: UserId, nickname: &str, token: &str) {
        self.users
            .insert(user_id, SimUser { nickname: nickname.to_string(), token: token.to_string() });
    }

    /// Create a group room with the given members.
    pub fn create_room(&mut self, room_id: RoomId, name: &str, members: &[UserId]) {
        self.rooms.insert(room_id, SimRoom {
            name: name.to_string(),
            kind: RoomKind::Group,
            created_at: base_time(),
            members: members.iter().copied().collect(),
            messages: Vec::new(),
            read_marks: HashMap::new(),
            last_read: HashMap::new(),
        });
    }

    /// Refuse (or accept again) new connections.
    pub fn set_refusing(&mut self, refuse: bool) {
        self.refuse_connections = refuse;
    }

    /// Open a transport connection.
    ///
    /// # Errors
    ///
    /// Returns the refusal reason while [`SimBroker::set_refusing`] is on.
    pub fn open(&mut self) -> Result<ConnectionId, String> {
        if self.refuse_connections {
            return Err("connection refused".to_string());
        }

        let id = self.next_connection;
        self.next_connection += 1;
        self.connections.insert(id, Connection { open: true, ..Connection::default() });
        tracing::debug!(connection = id, "broker accepted connection");
        Ok(id)
    }

    /// The client closed the connection.
    pub fn close(&mut self, connection: ConnectionId) {
        if self.connections.remove(&connection).is_some() {
            tracing::debug!(connection, "client closed connection");
        }
    }

    /// Fail the connection from the network side.
    ///
    /// Queued frames are still delivered, followed by the close.
    pub fn drop_connection(&mut self, connection: ConnectionId) {
        self.shut(connection, "connection reset by broker");
    }

    /// Fail every open connection.
    pub fn drop_all(&mut self) {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            self.drop_connection(id);
        }
    }

    /// Whether `connection` is open.
    pub fn is_open(&self, connection: ConnectionId) -> bool {
        self.connections.get(&connection).is_some_and(|c| c.open)
    }

    /// Whether events are queued for `connection`.
    pub fn has_pending(&self, connection: ConnectionId) -> bool {
        self.connections.get(&connection).is_some_and(|c| !c.outbound.is_empty())
    }

    /// Next event queued for `connection`.
    ///
    /// A connection the broker shut is forgotten once its close was taken.
    pub fn take_event(&mut self, connection: ConnectionId) -> Option<TransportEvent> {
        let conn = self.connections.get_mut(&connection)?;
        let event = conn.outbound.pop_front();
        if conn.outbound.is_empty() && !conn.open {
            self.connections.remove(&connection);
        }
        event
    }

    /// Process a packet sent by the client on `connection`.
    pub fn receive(&mut self, connection: ConnectionId, packet: Packet) {
        let Packet::Frame(frame) = packet else {
            return;
        };

        let Some(conn) = self.connections.get(&connection).filter(|c| c.open) else {
            tracing::debug!(connection, command = %frame.command, "frame on closed connection");
            return;
        };
        let user_id = conn.user_id;

        self.received.push((connection, frame.clone()));

        match (frame.command, user_id) {
            (Command::Connect | Command::Stomp, None) => self.on_connect(connection, &frame),
            (Command::Subscribe, Some(user)) => self.on_subscribe(connection, user, &frame),
            (Command::Unsubscribe, Some(_)) => self.on_unsubscribe(connection, &frame),
            (Command::Send, Some(user)) => self.on_send(connection, user, &frame),
            (Command::Disconnect, Some(_)) => self.on_disconnect(connection, &frame),
            (command, _) => self.reject(connection, &format!("unexpected {command}")),
        }
    }

    fn on_connect(&mut self, connection: ConnectionId, frame: &Frame) {
        let token = frame.header(headers::AUTHORIZATION).and_then(|v| v.strip_prefix("Bearer "));
        let user = token
            .and_then(|token| self.users.iter().find(|(_, u)| u.token == token))
            .map(|(id, _)| *id);

        let Some(user_id) = user else {
            self.reject(connection, "invalid credentials");
            return;
        };

        let connected = Frame::new(Command::Connected)
            .with_header(headers::VERSION, "1.2")
            .with_header(headers::HEART_BEAT, self.heart_beat.to_string());

        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.user_id = Some(user_id);
            conn.outbound.push_back(TransportEvent::Packet(Packet::Frame(connected)));
        }
        tracing::debug!(connection, user_id, "broker handshake complete");
    }

    fn on_subscribe(&mut self, connection: ConnectionId, user_id: UserId, frame: &Frame) {
        let (Some(id), Some(destination)) =
            (frame.header(headers::ID), frame.header(headers::DESTINATION))
        else {
            self.reject(connection, "SUBSCRIBE needs id and destination");
            return;
        };

        let topic = match Topic::from_destination(destination) {
            Ok(Topic::UserRooms(owner)) if owner != user_id => {
                self.reject(connection, "cannot subscribe to another user's rooms");
                return;
            },
            Ok(topic) => topic,
            Err(e) => {
                self.reject(connection, &e.to_string());
                return;
            },
        };

        let Some(conn) = self.connections.get_mut(&connection) else {
            return;
        };
        if conn.subscriptions.contains_key(id) {
            self.reject(connection, "duplicate subscription id");
            return;
        }
        conn.subscriptions.insert(id.to_string(), topic);

        self.acknowledge(connection, frame);
    }

    fn on_unsubscribe(&mut self, connection: ConnectionId, frame: &Frame) {
        if let (Some(id), Some(conn)) =
            (frame.header(headers::ID), self.connections.get_mut(&connection))
        {
            conn.subscriptions.remove(id);
        }
        self.acknowledge(connection, frame);
    }

    fn on_send(&mut self, connection: ConnectionId, user_id: UserId, frame: &Frame) {
        // Publish destinations mirror subscribe destinations under `/pub`.
        let topic = frame
            .header(headers::DESTINATION)
            .and_then(|d| d.strip_prefix("/pub"))
            .and_then(|rest| Topic::from_destination(&format!("/sub{rest}")).ok());

        match topic {
            Some(Topic::RoomMessages(room_id)) => match frame.json::<SendMessageRequest>() {
                Ok(request) => {
                    self.post_message(room_id, user_id, &request);
                },
                Err(e) => {
                    self.reject(connection, &e.to_string());
                    return;
                },
            },
            Some(Topic::RoomReadStatus(room_id)) => match frame.json::<ReadReceipt>() {
                Ok(receipt) => self.mark_read(room_id, user_id, receipt.message_id),
                Err(e) => {
                    self.reject(connection, &e.to_string());
                    return;
                },
            },
            Some(Topic::UserRooms(_)) | None => {
                self.reject(connection, "unknown publish destination");
                return;
            },
        }

        self.acknowledge(connection, frame);
    }

    fn on_disconnect(&mut self, connection: ConnectionId, frame: &Frame) {
        self.acknowledge(connection, frame);
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.open = false;
            conn.subscriptions.clear();
        }
    }

    /// Send a `RECEIPT` if the frame asked for one.
    fn acknowledge(&mut self, connection: ConnectionId, frame: &Frame) {
        let Some(receipt) = frame.header(headers::RECEIPT) else {
            return;
        };
        let ack = Frame::new(Command::Receipt).with_header(headers::RECEIPT_ID, receipt);
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.outbound.push_back(TransportEvent::Packet(Packet::Frame(ack)));
        }
    }

    /// Send `ERROR` and close, as a STOMP server does.
    fn reject(&mut self, connection: ConnectionId, message: &str) {
        tracing::debug!(connection, %message, "broker rejecting frame");
        let error = Frame::new(Command::Error).with_header(headers::MESSAGE, message);
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.outbound.push_back(TransportEvent::Packet(Packet::Frame(error)));
        }
        self.shut(connection, message);
    }

    fn shut(&mut self, connection: ConnectionId, reason: &str) {
        let Some(conn) = self.connections.get_mut(&connection).filter(|c| c.open) else {
            return;
        };
        conn.open = false;
        conn.subscriptions.clear();
        conn.outbound.push_back(TransportEvent::Closed(reason.to_string()));
    }

    /// Store a message from `sender` and push it to subscribers.
    ///
    /// Every member also receives a room update on their room feed. Returns
    /// `None` if the room does not exist or `sender` is not a member.
    pub fn post_message(
        &mut self,
        room_id: RoomId,
        sender: UserId,
        request: &SendMessageRequest,
    ) -> Option<MessageId> {
        let nickname = self.nickname(sender);
        let room = self.rooms.get_mut(&room_id).filter(|r| r.members.contains(&sender))?;

        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let (file_url, file_name) = request
            .file()
            .map_or((None, None), |(url, name)| (Some(url.to_string()), Some(name.to_string())));
        let message = ChatMessage {
            message_id,
            room_id,
            sender_id: sender,
            sender_nickname: nickname,
            sender_profile_image_url: None,
            kind: request.kind(),
            content: request.content().map(str::to_string),
            file_url,
            file_name,
            created_at: timestamp(message_id),
            unread_count: room.members.len().saturating_sub(1) as u32,
        };

        room.messages.push(message.clone());
        room.read_marks.insert(sender, message_id);
        let members: Vec<UserId> = room.members.iter().copied().collect();

        self.publish(Topic::RoomMessages(room_id), &message);
        for member in members {
            if let Some(update) = self.room_update(room_id, member) {
                self.publish(Topic::UserRooms(member), &update);
            }
        }

        Some(message_id)
    }

    /// Record that `reader` has read up to `message_id` and push the read
    /// event.
    ///
    /// Every call is pushed, even one that does not advance the reader.
    pub fn mark_read(&mut self, room_id: RoomId, reader: UserId, message_id: MessageId) {
        if !self.set_read_mark(room_id, reader, message_id) {
            return;
        }
        self.publish(Topic::RoomReadStatus(room_id), &ReadStatusEvent {
            user_id: reader,
            message_id,
        });
    }

    /// Advance the read marker without pushing. Returns `false` for unknown
    /// rooms.
    pub fn set_read_mark(
        &mut self,
        room_id: RoomId,
        reader: UserId,
        message_id: MessageId,
    ) -> bool {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return false;
        };

        let previous = room.read_marks.get(&reader).copied().unwrap_or(MessageId::MIN);
        if message_id > previous {
            for message in &mut room.messages {
                let newly_read = message.message_id > previous && message.message_id <= message_id;
                if newly_read && message.sender_id != reader {
                    message.unread_count = message.unread_count.saturating_sub(1);
                }
            }
            room.read_marks.insert(reader, message_id);
        }
        true
    }

    /// Store `reader`'s last-read marker. Returns `false` for unknown rooms.
    pub fn persist_last_read(
        &mut self,
        room_id: RoomId,
        reader: UserId,
        message_id: MessageId,
    ) -> bool {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return false;
        };
        room.last_read.insert(reader, message_id);
        true
    }

    /// Last-read marker `reader` persisted for `room_id`.
    pub fn last_read(&self, room_id: RoomId, reader: UserId) -> Option<MessageId> {
        self.rooms.get(&room_id)?.last_read.get(&reader).copied()
    }

    /// Push a room update to `user_id`'s room feed.
    pub fn push_room_update(&mut self, user_id: UserId, update: &RoomUpdate) {
        self.publish(Topic::UserRooms(user_id), update);
    }

    fn publish<T: Serialize>(&mut self, topic: Topic, body: &T) {
        let destination = topic.subscribe_destination();

        for conn in self.connections.values_mut().filter(|c| c.open) {
            let ids: Vec<&String> =
                conn.subscriptions.iter().filter(|(_, t)| **t == topic).map(|(id, _)| id).collect();

            let mut frames = Vec::with_capacity(ids.len());
            for id in ids {
                let delivery = self.next_delivery;
                self.next_delivery += 1;

                let frame = Frame::new(Command::Message)
                    .with_header(headers::DESTINATION, destination.as_str())
                    .with_header(headers::SUBSCRIPTION, id.as_str())
                    .with_header(headers::MESSAGE_ID, delivery.to_string())
                    .with_json_body(body);
                match frame {
                    Ok(frame) => frames.push(frame),
                    Err(e) => tracing::error!(%topic, error = %e, "unserializable push"),
                }
            }

            conn.outbound
                .extend(frames.into_iter().map(|f| TransportEvent::Packet(Packet::Frame(f))));
        }
    }

    fn room_update(&self, room_id: RoomId, user_id: UserId) -> Option<RoomUpdate> {
        let room = self.rooms.get(&room_id)?;
        let last = room.messages.last()?;
        Some(RoomUpdate {
            room_id,
            last_message: Some(preview(last)),
            last_message_time: last.created_at,
            last_message_sender_id: last.sender_id,
            last_message_sender_nickname: last.sender_nickname.clone(),
            unread_count: unread_for(room, user_id),
        })
    }

    fn nickname(&self, user_id: UserId) -> String {
        self.users.get(&user_id).map_or_else(|| format!("user{user_id}"), |u| u.nickname.clone())
    }

    fn user(&self, user_id: UserId) -> User {
        let nickname = self.nickname(user_id);
        User {
            id: user_id,
            email: format!("{nickname}@roomline.test"),
            nickname,
            profile_image_url: None,
            friend_code: None,
        }
    }

    /// Room list for `user_id`, as the REST endpoint returns it.
    pub fn room_summaries(&self, user_id: UserId) -> Vec<RoomSummary> {
        self.rooms
            .iter()
            .filter(|(_, room)| room.members.contains(&user_id))
            .map(|(id, room)| {
                let last = room.messages.last();
                RoomSummary {
                    id: *id,
                    name: room.name.clone(),
                    kind: room.kind,
                    member_count: room.members.len() as u32,
                    last_message_preview: last.map(preview),
                    last_sender: last.map(|m| m.sender_nickname.clone()),
                    last_message_time: last.map_or(room.created_at, |m| m.created_at),
                    unread_count: unread_for(room, user_id),
                }
            })
            .collect()
    }

    /// One history page: up to `size` messages older than `before`,
    /// ascending.
    pub fn history(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
        size: usize,
    ) -> Vec<ChatMessage> {
        let Some(room) = self.rooms.get(&room_id) else {
            return Vec::new();
        };

        let older: Vec<&ChatMessage> = room
            .messages
            .iter()
            .filter(|m| before.is_none_or(|before| m.message_id < before))
            .collect();
        let skip = older.len().saturating_sub(size);
        older.into_iter().skip(skip).cloned().collect()
    }

    /// Room detail. `None` for unknown rooms.
    pub fn room_detail(&self, room_id: RoomId) -> Option<ChatRoom> {
        let room = self.rooms.get(&room_id)?;
        Some(ChatRoom {
            id: room_id,
            name: room.name.clone(),
            kind: room.kind,
            created_at: room.created_at,
            users: room.members.iter().map(|id| self.user(*id)).collect(),
        })
    }

    /// Create a room on behalf of `creator`, who becomes a member.
    ///
    /// Two members make a private room; more make a group.
    pub fn create_room_for(&mut self, creator: UserId, request: &CreateRoomRequest) -> ChatRoom {
        let room_id = self.rooms.keys().next_back().map_or(1, |last| last + 1);
        let mut members = request.user_ids.clone();
        members.push(creator);
        self.create_room(room_id, &request.name, &members);

        if let Some(room) = self.rooms.get_mut(&room_id).filter(|r| r.members.len() == 2) {
            room.kind = RoomKind::Private;
        }

        let mut detail = self.room_detail(room_id).unwrap_or_else(|| ChatRoom {
            id: room_id,
            name: request.name.clone(),
            kind: RoomKind::Group,
            created_at: base_time(),
            users: Vec::new(),
        });
        detail.name.clone_from(&request.name);
        detail
    }

    /// Remove `user_id` from a room. Returns `false` if they were not in it.
    pub fn leave_room(&mut self, room_id: RoomId, user_id: UserId) -> bool {
        self.rooms.get_mut(&room_id).is_some_and(|room| room.members.remove(&user_id))
    }

    /// Frames received from clients, in arrival order.
    pub fn received_frames(&self) -> impl Iterator<Item = &Frame> {
        self.received.iter().map(|(_, frame)| frame)
    }

    /// Number of `SUBSCRIBE` frames received for `topic`.
    pub fn subscribe_count(&self, topic: Topic) -> usize {
        let destination = topic.subscribe_destination();
        self.received_frames()
            .filter(|f| f.command == Command::Subscribe)
            .filter(|f| f.header(headers::DESTINATION) == Some(destination.as_str()))
            .count()
    }

    /// Topics `user_id` is subscribed to across open connections. A topic
    /// subscribed twice appears twice.
    pub fn subscriptions(&self, user_id: UserId) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .connections
            .values()
            .filter(|c| c.open && c.user_id == Some(user_id))
            .flat_map(|c| c.subscriptions.values().copied())
            .collect();
        topics.sort();
        topics
    }

    /// Number of open, authenticated connections for `user_id`.
    pub fn sessions(&self, user_id: UserId) -> usize {
        self.connections.values().filter(|c| c.open && c.user_id == Some(user_id)).count()
    }
}

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap_or_default()
}

/// Message `n` is stamped `n` seconds after the base time.
fn timestamp(message_id: MessageId) -> NaiveDateTime {
    let base = base_time();
    base.checked_add_signed(TimeDelta::seconds(message_id)).unwrap_or(base)
}

fn preview(message: &ChatMessage) -> String {
    match message.body() {
        MessageBody::Text(text) => text.to_string(),
        MessageBody::Attachment { name, .. } => name.to_string(),
    }
}

fn unread_for(room: &SimRoom, user_id: UserId) -> u32 {
    let mark = room.read_marks.get(&user_id).copied().unwrap_or(MessageId::MIN);
    room.messages.iter().filter(|m| m.message_id > mark && m.sender_id != user_id).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> SimBroker {
        let mut broker = SimBroker::new();
        broker.add_user(1, "ana", "tok-1");
        broker.add_user(2, "ben", "tok-2");
        broker.create_room(10, "general", &[1, 2]);
        broker
    }

    fn frames(broker: &mut SimBroker, conn: ConnectionId) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Some(event) = broker.take_event(conn) {
            if let TransportEvent::Packet(Packet::Frame(frame)) = event {
                out.push(frame);
            }
        }
        out
    }

    fn login(broker: &mut SimBroker, token: &str) -> ConnectionId {
        let conn = broker.open().unwrap();
        let connect = Frame::connect("localhost", HeartBeat::DISABLED, Some(token));
        broker.receive(conn, Packet::Frame(connect));
        let reply = frames(broker, conn);
        assert_eq!(reply[0].command, Command::Connected);
        conn
    }

    fn subscribe(broker: &mut SimBroker, conn: ConnectionId, id: &str, topic: Topic) {
        let frame = Frame::subscribe(id, &topic.subscribe_destination(), Some(id));
        broker.receive(conn, Packet::Frame(frame));
    }

    #[test]
    fn bad_token_is_rejected_and_closed() {
        let mut broker = broker();
        let conn = broker.open().unwrap();

        let connect = Frame::connect("localhost", HeartBeat::DISABLED, Some("nope"));
        broker.receive(conn, Packet::Frame(connect));

        let first = broker.take_event(conn).unwrap();
        assert!(matches!(
            first,
            TransportEvent::Packet(Packet::Frame(f)) if f.command == Command::Error
        ));
        assert!(matches!(broker.take_event(conn), Some(TransportEvent::Closed(_))));
        assert!(!broker.is_open(conn));
    }

    #[test]
    fn subscribe_is_acknowledged_with_receipt() {
        let mut broker = broker();
        let conn = login(&mut broker, "tok-1");

        subscribe(&mut broker, conn, "sub-1", Topic::UserRooms(1));

        let reply = frames(&mut broker, conn);
        assert_eq!(reply[0].command, Command::Receipt);
        assert_eq!(reply[0].header(headers::RECEIPT_ID), Some("sub-1"));
        assert_eq!(broker.subscriptions(1), vec![Topic::UserRooms(1)]);
    }

    #[test]
    fn foreign_room_feed_is_forbidden() {
        let mut broker = broker();
        let conn = login(&mut broker, "tok-1");

        subscribe(&mut broker, conn, "sub-1", Topic::UserRooms(2));

        assert!(!broker.is_open(conn));
    }

    #[test]
    fn posted_message_reaches_subscribers_and_room_feeds() {
        let mut broker = broker();
        let ana = login(&mut broker, "tok-1");
        let ben = login(&mut broker, "tok-2");
        subscribe(&mut broker, ana, "sub-1", Topic::RoomMessages(10));
        subscribe(&mut broker, ben, "sub-1", Topic::UserRooms(2));
        frames(&mut broker, ana);
        frames(&mut broker, ben);

        let id = broker.post_message(10, 2, &SendMessageRequest::text("hi")).unwrap();

        let pushed: ChatMessage = frames(&mut broker, ana)[0].json().unwrap();
        assert_eq!(pushed.message_id, id);
        assert_eq!(pushed.unread_count, 1);

        let update: RoomUpdate = frames(&mut broker, ben)[0].json().unwrap();
        assert_eq!(update.room_id, 10);
        assert_eq!(update.unread_count, 0);
        assert_eq!(broker.room_summaries(1)[0].unread_count, 1);
    }

    #[test]
    fn reads_decrement_once_per_reader() {
        let mut broker = broker();
        let id = broker.post_message(10, 1, &SendMessageRequest::text("hi")).unwrap();

        broker.mark_read(10, 2, id);
        broker.mark_read(10, 2, id);

        assert_eq!(broker.history(10, None, 50)[0].unread_count, 0);
    }

    #[test]
    fn history_pages_backwards() {
        let mut broker = broker();
        let ids: Vec<MessageId> = (0..5)
            .map(|i| {
                broker.post_message(10, 1, &SendMessageRequest::text(format!("m{i}"))).unwrap()
            })
            .collect();

        let newest = broker.history(10, None, 2);
        assert_eq!(newest.iter().map(|m| m.message_id).collect::<Vec<_>>(), ids[3..].to_vec());

        let older = broker.history(10, Some(ids[3]), 2);
        assert_eq!(older.iter().map(|m| m.message_id).collect::<Vec<_>>(), ids[1..3].to_vec());
    }

    #[test]
    fn dropped_connection_delivers_queued_frames_then_close() {
        let mut broker = broker();
        let conn = login(&mut broker, "tok-1");
        subscribe(&mut broker, conn, "sub-1", Topic::UserRooms(1));

        broker.drop_connection(conn);

        assert!(matches!(broker.take_event(conn), Some(TransportEvent::Packet(_))));
        assert!(matches!(broker.take_event(conn), Some(TransportEvent::Closed(_))));
        assert!(broker.take_event(conn).is_none());
        assert!(broker.subscriptions(1).is_empty());
    }

    #[test]
    fn refusing_broker_fails_open() {
        let mut broker = broker();
        broker.set_refusing(true);
        assert!(broker.open().is_err());

        broker.set_refusing(false);
        login(&mut broker, "tok-1");
        assert_eq!(broker.sessions(1), 1);
    }
}
