//! Transport session state machine.
//!
//! Owns the single logical connection to the broker: handshake, heart-beats,
//! reconnect back-off and the publish/subscribe primitives. Uses the action
//! pattern: methods take the current time and return actions for the driver to
//! execute. The session never performs I/O.
//!
//! # State Machine
//!
//! ```text
//!                 connect()                CONNECTED
//! ┌──────────────┐────────>┌────────────┐──────────>┌───────────┐
//! │ Disconnected │         │ Connecting │           │ Connected │
//! └──────────────┘<────────└────────────┘           └───────────┘
//!     ↑      │    timeout / ERROR / close                 │
//!     │      │                                            │
//!     │      └── reconnect_delay elapsed ──> Connecting   │
//!     │                                                   │
//!     └──────────── drop / missed heart-beat / disconnect()
//! ```
//!
//! A failed connection retries after `reconnect_delay`, forever, until
//! [`TransportSession::disconnect`] is called. Every transition out of
//! `Connected` tears down all subscriptions exactly once.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use roomline_proto::{Command, Frame, HeartBeat, Packet, Topic, headers};
use serde::Serialize;

use crate::{
    error::SessionError,
    registry::{Registration, SubscriptionRegistry},
};

/// Delay before an automatic reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Heart-beat interval offered in both directions.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(4);

/// Time allowed from opening the transport to `CONNECTED`.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection. A reconnect may be pending.
    Disconnected,
    /// Transport opening or `CONNECT` sent, waiting for `CONNECTED`.
    Connecting,
    /// Handshake complete.
    Connected,
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay before an automatic reconnect.
    pub reconnect_delay: Duration,
    /// Interval at which we offer to send heart-beats.
    pub heartbeat_outgoing: Duration,
    /// Interval at which we want to receive heart-beats.
    pub heartbeat_incoming: Duration,
    /// Time allowed to complete the handshake.
    pub handshake_timeout: Duration,
    /// Broker virtual host sent in `CONNECT`.
    pub host: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heartbeat_outgoing: DEFAULT_HEARTBEAT,
            heartbeat_incoming: DEFAULT_HEARTBEAT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            host: "localhost".to_string(),
        }
    }
}

/// Why the session left `Connecting` or `Connected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// [`TransportSession::disconnect`] was called.
    Requested,
    /// The connection failed.
    Failed(SessionError),
}

/// Actions returned by the session.
///
/// The driver executes `OpenTransport`, `SendPacket` and `CloseTransport`.
/// The rest are notifications for the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction<H> {
    /// Open the WebSocket, then call [`TransportSession::transport_opened`].
    OpenTransport,
    /// Send this packet.
    SendPacket(Packet),
    /// Close the WebSocket. No-op if it is already closed.
    CloseTransport,
    /// Handshake completed.
    Connected,
    /// Connection ended.
    Disconnected {
        /// Why.
        reason: DisconnectReason,
        /// Whether a reconnect is scheduled.
        will_retry: bool,
    },
    /// A `MESSAGE` arrived for a live subscription.
    Deliver {
        /// Topic it was delivered on.
        topic: Topic,
        /// Handler registered with the subscription.
        handler: H,
        /// The frame.
        frame: Frame,
    },
    /// The broker acknowledged a receipt.
    Receipt {
        /// Acknowledged receipt id.
        receipt_id: String,
        /// Subscription the receipt confirmed, if any.
        topic: Option<Topic>,
    },
    /// The broker reported an error on an established connection.
    BrokerError {
        /// Broker's `message` header, or the body if absent.
        message: String,
    },
}

/// Transport session.
///
/// Generic over `Instant` so tests and simulations can drive it with virtual
/// time, and over the handler value `H` routed with delivered frames.
#[derive(Debug, Clone)]
pub struct TransportSession<H, I = Instant>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    state: SessionState,
    config: SessionConfig,
    registry: SubscriptionRegistry<H>,
    /// Set by `connect`, cleared by `disconnect`. Failures only retry while set.
    wanted: bool,
    attempt_started: Option<I>,
    handshake_sent: bool,
    retry_from: Option<I>,
    last_read: Option<I>,
    last_write: Option<I>,
    send_every: Option<Duration>,
    expect_every: Option<Duration>,
}

impl<H, I> TransportSession<H, I>
where
    H: Clone,
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a disconnected session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            config,
            registry: SubscriptionRegistry::new(),
            wanted: false,
            attempt_started: None,
            handshake_sent: false,
            retry_from: None,
            last_read: None,
            last_write: None,
            send_every: None,
            expect_every: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake is complete.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Live subscriptions.
    pub fn registry(&self) -> &SubscriptionRegistry<H> {
        &self.registry
    }

    /// Negotiated `(send_every, expect_every)` heart-beat intervals.
    pub fn heartbeat(&self) -> (Option<Duration>, Option<Duration>) {
        (self.send_every, self.expect_every)
    }

    /// Whether an automatic reconnect is scheduled.
    pub fn retry_pending(&self) -> bool {
        self.retry_from.is_some()
    }

    /// Start connecting.
    ///
    /// No-op while `Connecting` or `Connected`. From `Disconnected` this skips
    /// any pending back-off.
    pub fn connect(&mut self, now: I) -> Vec<SessionAction<H>> {
        if self.state != SessionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect ignored");
            return Vec::new();
        }

        self.wanted = true;
        self.begin_attempt(now)
    }

    /// The transport is open; send `CONNECT`.
    ///
    /// `token` is the stored access token, read by the driver just before
    /// this call. Without one the `Authorization` header is omitted.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` unless `Connecting` with no handshake
    ///   sent yet
    pub fn transport_opened(
        &mut self,
        now: I,
        token: Option<&str>,
    ) -> Result<Vec<SessionAction<H>>, SessionError> {
        if self.state != SessionState::Connecting || self.handshake_sent {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "transport_opened",
            });
        }

        self.handshake_sent = true;
        self.last_read = Some(now);

        let offer =
            HeartBeat::from_durations(
                self.config.heartbeat_outgoing,
                self.config.heartbeat_incoming,
            );
        let frame = Frame::connect(&self.config.host, offer, token);

        Ok(self.write(now, Packet::Frame(frame)))
    }

    /// The transport closed or failed to open.
    pub fn transport_closed(&mut self, now: I, reason: &str) -> Vec<SessionAction<H>> {
        if self.state == SessionState::Disconnected {
            return Vec::new();
        }

        self.fail(now, SessionError::Transport(reason.to_string()))
    }

    /// Process one inbound packet.
    ///
    /// Any packet counts as liveness. Packets that arrive while
    /// `Disconnected` are stale and dropped.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnexpectedFrame` for frames that make no sense in the
    ///   current state (the session is left unchanged)
    pub fn handle_packet(
        &mut self,
        now: I,
        packet: Packet,
    ) -> Result<Vec<SessionAction<H>>, SessionError> {
        if self.state == SessionState::Disconnected {
            tracing::debug!("dropping packet while disconnected");
            return Ok(Vec::new());
        }

        self.last_read = Some(now);

        let frame = match packet {
            Packet::Heartbeat => return Ok(Vec::new()),
            Packet::Frame(frame) => frame,
        };

        match (self.state, frame.command) {
            (SessionState::Connecting, Command::Connected) if self.handshake_sent => {
                Ok(self.complete_handshake(&frame))
            },
            (SessionState::Connecting, Command::Error) => {
                let mut actions = vec![SessionAction::CloseTransport];
                let error = SessionError::HandshakeRejected(error_message(&frame));
                actions.extend(self.fail(now, error));
                Ok(actions)
            },
            (SessionState::Connected, Command::Message) => Ok(self.deliver(frame)),
            (SessionState::Connected, Command::Receipt) => Ok(self.receipt(&frame)),
            (SessionState::Connected, Command::Error) => {
                let message = error_message(&frame);
                tracing::warn!(%message, "broker error");
                Ok(vec![SessionAction::BrokerError { message }])
            },
            (state, command) => Err(SessionError::UnexpectedFrame { state, command }),
        }
    }

    /// Periodic maintenance: reconnect back-off, handshake timeout, heart-beat
    /// send and heart-beat loss detection.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction<H>> {
        match self.state {
            SessionState::Disconnected => {
                let due = self
                    .retry_from
                    .is_some_and(|from| now - from >= self.config.reconnect_delay);
                if due {
                    tracing::debug!("reconnecting");
                    self.begin_attempt(now)
                } else {
                    Vec::new()
                }
            },
            SessionState::Connecting => {
                let Some(started) = self.attempt_started else {
                    return Vec::new();
                };
                let elapsed = now - started;
                if elapsed <= self.config.handshake_timeout {
                    return Vec::new();
                }

                let mut actions = vec![SessionAction::CloseTransport];
                actions.extend(self.fail(now, SessionError::HandshakeTimeout { elapsed }));
                actions
            },
            SessionState::Connected => {
                if let (Some(every), Some(last)) = (self.expect_every, self.last_read) {
                    let elapsed = now - last;
                    if elapsed > every * 2 {
                        let mut actions = vec![SessionAction::CloseTransport];
                        actions.extend(self.fail(now, SessionError::HeartbeatTimeout { elapsed }));
                        return actions;
                    }
                }

                let send_due = matches!(
                    (self.send_every, self.last_write),
                    (Some(every), Some(last)) if now - last >= every
                );
                if send_due { self.write(now, Packet::Heartbeat) } else { Vec::new() }
            },
        }
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// Safe to call repeatedly; only the first call from a connected state
    /// produces actions.
    pub fn disconnect(&mut self, _now: I) -> Vec<SessionAction<H>> {
        self.wanted = false;
        self.retry_from = None;

        let mut actions = match self.state {
            SessionState::Disconnected => return Vec::new(),
            SessionState::Connecting => vec![SessionAction::CloseTransport],
            SessionState::Connected => vec![
                SessionAction::SendPacket(Packet::Frame(Frame::disconnect(None))),
                SessionAction::CloseTransport,
            ],
        };

        self.enter_disconnected();
        tracing::debug!("disconnected on request");

        actions.push(SessionAction::Disconnected {
            reason: DisconnectReason::Requested,
            will_retry: false,
        });
        actions
    }

    /// Publish `body` as JSON to `topic`.
    ///
    /// Dropped with a warning when not connected. No queuing.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotPublishable` for subscribe-only topics
    /// - `SessionError::Protocol` if `body` fails to serialize
    pub fn publish<T: Serialize>(
        &mut self,
        now: I,
        topic: Topic,
        body: &T,
    ) -> Result<Vec<SessionAction<H>>, SessionError> {
        let destination = topic.publish_destination().ok_or(SessionError::NotPublishable(topic))?;

        if !self.is_connected() {
            tracing::warn!(%topic, "dropping publish while not connected");
            return Ok(Vec::new());
        }

        let frame = Frame::send_json(&destination, body)?;
        Ok(self.write(now, Packet::Frame(frame)))
    }

    /// Subscribe to `topic` unless already subscribed.
    ///
    /// No-op when not connected. The `SUBSCRIBE` frame asks for a receipt,
    /// reported later as [`SessionAction::Receipt`] with the topic set.
    pub fn subscribe(&mut self, now: I, topic: Topic, handler: H) -> Vec<SessionAction<H>> {
        if !self.is_connected() {
            tracing::debug!(%topic, "not connected, subscribe skipped");
            return Vec::new();
        }

        match self.registry.ensure_subscribed(topic, handler) {
            Registration::Existing(_) => Vec::new(),
            Registration::Created(handle) => {
                tracing::debug!(%topic, id = handle.id(), "subscribing");
                let frame = Frame::subscribe(
                    handle.id(),
                    &topic.subscribe_destination(),
                    Some(handle.receipt()),
                );
                self.write(now, Packet::Frame(frame))
            },
        }
    }

    /// Unsubscribe from `topic` if subscribed.
    pub fn unsubscribe(&mut self, now: I, topic: Topic) -> Vec<SessionAction<H>> {
        match self.registry.ensure_unsubscribed(topic) {
            Some(handle) if self.is_connected() => {
                tracing::debug!(%topic, id = handle.id(), "unsubscribing");
                self.write(now, Packet::Frame(Frame::unsubscribe(handle.id())))
            },
            _ => Vec::new(),
        }
    }

    fn begin_attempt(&mut self, now: I) -> Vec<SessionAction<H>> {
        self.state = SessionState::Connecting;
        self.attempt_started = Some(now);
        self.handshake_sent = false;
        self.retry_from = None;
        vec![SessionAction::OpenTransport]
    }

    fn complete_handshake(&mut self, frame: &Frame) -> Vec<SessionAction<H>> {
        let server = match frame.header(headers::HEART_BEAT).map(str::parse::<HeartBeat>) {
            Some(Ok(server)) => server,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "ignoring malformed heart-beat header");
                HeartBeat::DISABLED
            },
            None => HeartBeat::DISABLED,
        };

        let offer =
            HeartBeat::from_durations(
                self.config.heartbeat_outgoing,
                self.config.heartbeat_incoming,
            );
        let (send_every, expect_every) = offer.negotiate(server);

        self.state = SessionState::Connected;
        self.attempt_started = None;
        self.send_every = send_every;
        self.expect_every = expect_every;

        tracing::debug!(?send_every, ?expect_every, "connected");
        vec![SessionAction::Connected]
    }

    fn deliver(&self, frame: Frame) -> Vec<SessionAction<H>> {
        let Some(subscription) = frame.header(headers::SUBSCRIPTION) else {
            tracing::warn!("MESSAGE without subscription header");
            return Vec::new();
        };

        match self.registry.route(subscription) {
            Some((topic, handler)) => vec![SessionAction::Deliver { topic, handler, frame }],
            None => {
                tracing::debug!(subscription, "dropping frame for stale subscription");
                Vec::new()
            },
        }
    }

    fn receipt(&mut self, frame: &Frame) -> Vec<SessionAction<H>> {
        let Some(receipt_id) = frame.header(headers::RECEIPT_ID) else {
            tracing::warn!("RECEIPT without receipt-id header");
            return Vec::new();
        };

        let topic = self.registry.confirm(receipt_id);
        vec![SessionAction::Receipt { receipt_id: receipt_id.to_string(), topic }]
    }

    fn fail(&mut self, now: I, err: SessionError) -> Vec<SessionAction<H>> {
        tracing::warn!(error = %err, "connection lost");

        self.enter_disconnected();

        let will_retry = self.wanted && err.is_connection_failure();
        self.retry_from = will_retry.then_some(now);

        vec![SessionAction::Disconnected { reason: DisconnectReason::Failed(err), will_retry }]
    }

    fn enter_disconnected(&mut self) {
        if self.state == SessionState::Connected {
            let removed = self.registry.teardown_all();
            tracing::debug!(subscriptions = removed.len(), "subscriptions torn down");
        }

        self.state = SessionState::Disconnected;
        self.attempt_started = None;
        self.handshake_sent = false;
        self.last_read = None;
        self.last_write = None;
        self.send_every = None;
        self.expect_every = None;
    }

    fn write(&mut self, now: I, packet: Packet) -> Vec<SessionAction<H>> {
        self.last_write = Some(now);
        vec![SessionAction::SendPacket(packet)]
    }
}

/// Text of an `ERROR` frame: the `message` header, else the body.
fn error_message(frame: &Frame) -> String {
    match frame.header(headers::MESSAGE) {
        Some(message) => message.to_string(),
        None => String::from_utf8_lossy(&frame.body).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use roomline_proto::payloads::{MessageKind, ReadReceipt, SendMessageRequest};

    use super::*;

    type Session = TransportSession<u8>;

    fn connected_frame(heart_beat: &str) -> Packet {
        Packet::Frame(
            Frame::new(Command::Connected)
                .with_header(headers::VERSION, "1.2")
                .with_header(headers::HEART_BEAT, heart_beat),
        )
    }

    fn connect(session: &mut Session, t0: Instant, heart_beat: &str) {
        assert_eq!(session.connect(t0), vec![SessionAction::OpenTransport]);
        session.transport_opened(t0, Some("tok")).unwrap();
        let actions = session.handle_packet(t0, connected_frame(heart_beat)).unwrap();
        assert_eq!(actions, vec![SessionAction::Connected]);
    }

    fn sent_frames(actions: &[SessionAction<u8>]) -> Vec<&Frame> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::SendPacket(Packet::Frame(f)) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn handshake_carries_bearer_token() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());

        session.connect(t0);
        let actions = session.transport_opened(t0, Some("abc")).unwrap();

        let frames = sent_frames(&actions);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, Command::Connect);
        assert_eq!(frames[0].header(headers::AUTHORIZATION), Some("Bearer abc"));
        assert_eq!(frames[0].header(headers::HEART_BEAT), Some("4000,4000"));
        assert_eq!(frames[0].header(headers::ACCEPT_VERSION), Some("1.2"));
    }

    #[test]
    fn missing_token_omits_header() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());

        session.connect(t0);
        let actions = session.transport_opened(t0, None).unwrap();

        assert_eq!(sent_frames(&actions)[0].header(headers::AUTHORIZATION), None);
    }

    #[test]
    fn connect_is_noop_while_connecting_or_connected() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());

        session.connect(t0);
        assert!(session.connect(t0).is_empty());

        session.transport_opened(t0, None).unwrap();
        session.handle_packet(t0, connected_frame("0,0")).unwrap();
        assert!(session.connect(t0).is_empty());
    }

    #[test]
    fn opened_twice_is_invalid() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());

        assert!(matches!(
            session.transport_opened(t0, None),
            Err(SessionError::InvalidState { .. })
        ));

        session.connect(t0);
        session.transport_opened(t0, None).unwrap();
        assert!(session.transport_opened(t0, None).is_err());
    }

    #[test]
    fn heartbeats_are_negotiated() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "10000,2000");

        assert_eq!(
            session.heartbeat(),
            (Some(Duration::from_secs(4)), Some(Duration::from_secs(10)))
        );
    }

    #[test]
    fn sends_heartbeat_when_idle() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "4000,4000");

        assert!(session.tick(t0 + Duration::from_secs(3)).is_empty());

        let t1 = t0 + Duration::from_secs(4);
        assert_eq!(session.tick(t1), vec![SessionAction::SendPacket(Packet::Heartbeat)]);
        assert!(session.tick(t1 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn missed_heartbeats_drop_and_retry() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "4000,4000");
        session.subscribe(t0, Topic::UserRooms(1), 0);

        session.handle_packet(t0 + Duration::from_secs(5), Packet::Heartbeat).unwrap();
        // Outgoing heart-beat only; inbound window still open.
        let actions = session.tick(t0 + Duration::from_secs(12));
        assert_eq!(actions, vec![SessionAction::SendPacket(Packet::Heartbeat)]);

        let actions = session.tick(t0 + Duration::from_secs(14));
        assert_eq!(actions[0], SessionAction::CloseTransport);
        assert!(matches!(
            &actions[1],
            SessionAction::Disconnected {
                reason: DisconnectReason::Failed(SessionError::HeartbeatTimeout { .. }),
                will_retry: true,
            }
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.registry().is_empty());
    }

    #[test]
    fn drop_retries_after_fixed_delay() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");

        let actions = session.transport_closed(t0, "reset by peer");
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Disconnected { will_retry: true, .. }]
        ));

        assert!(session.tick(t0 + Duration::from_millis(4999)).is_empty());
        assert_eq!(session.tick(t0 + Duration::from_secs(5)), vec![SessionAction::OpenTransport]);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn handshake_rejection_retries() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        session.connect(t0);
        session.transport_opened(t0, Some("expired")).unwrap();

        let error = Frame::new(Command::Error).with_header(headers::MESSAGE, "invalid token");
        let actions = session.handle_packet(t0, Packet::Frame(error)).unwrap();

        assert_eq!(actions[0], SessionAction::CloseTransport);
        assert_eq!(actions[1], SessionAction::Disconnected {
            reason: DisconnectReason::Failed(SessionError::HandshakeRejected(
                "invalid token".into()
            )),
            will_retry: true,
        });
        assert!(session.retry_pending());
    }

    #[test]
    fn handshake_timeout() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        session.connect(t0);

        assert!(session.tick(t0 + Duration::from_secs(30)).is_empty());
        let actions = session.tick(t0 + Duration::from_secs(31));

        assert_eq!(actions[0], SessionAction::CloseTransport);
        assert!(matches!(actions[1], SessionAction::Disconnected { will_retry: true, .. }));
    }

    #[test]
    fn broker_error_keeps_session() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");

        let error = Frame::new(Command::Error).with_body("destination forbidden");
        let actions = session.handle_packet(t0, Packet::Frame(error)).unwrap();

        assert_eq!(actions, vec![SessionAction::BrokerError {
            message: "destination forbidden".into()
        }]);
        assert!(session.is_connected());
    }

    #[test]
    fn disconnect_twice_is_safe() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");
        session.subscribe(t0, Topic::UserRooms(1), 0);

        let actions = session.disconnect(t0);
        assert_eq!(sent_frames(&actions)[0].command, Command::Disconnect);
        assert!(actions.contains(&SessionAction::CloseTransport));
        assert!(session.registry().is_empty());

        assert!(session.disconnect(t0).is_empty());
        assert!(session.registry().is_empty());
    }

    #[test]
    fn disconnect_cancels_retry() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");
        session.transport_closed(t0, "gone");

        assert!(session.disconnect(t0).is_empty());
        assert!(!session.retry_pending());
        assert!(session.tick(t0 + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn close_after_disconnect_is_ignored() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");
        session.disconnect(t0);

        assert!(session.transport_closed(t0, "closed").is_empty());
        assert!(!session.retry_pending());
    }

    #[test]
    fn publish_requires_connection() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        let receipt = ReadReceipt { message_id: 3 };

        assert!(session.publish(t0, Topic::RoomReadStatus(2), &receipt).unwrap().is_empty());

        connect(&mut session, t0, "0,0");
        let actions = session.publish(t0, Topic::RoomReadStatus(2), &receipt).unwrap();
        let frames = sent_frames(&actions);
        assert_eq!(frames[0].header(headers::DESTINATION), Some("/pub/chat/rooms/2/read"));
        assert_eq!(frames[0].body.as_ref(), br#"{"messageId":3}"#);

        assert!(matches!(
            session.publish(t0, Topic::UserRooms(1), &receipt),
            Err(SessionError::NotPublishable(_))
        ));
    }

    #[test]
    fn published_messages_are_json_bodies() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");

        let text = SendMessageRequest::text("hi");
        let attachment =
            SendMessageRequest::attachment(MessageKind::Image, "https://f/cat.png", "cat.png");
        let mut actions = session.publish(t0, Topic::RoomMessages(2), &text).unwrap();
        actions.extend(session.publish(t0, Topic::RoomMessages(2), &attachment).unwrap());

        let frames = sent_frames(&actions);
        assert_eq!(frames[0].header(headers::DESTINATION), Some("/pub/chat/rooms/2"));

        let body: serde_json::Value = serde_json::from_slice(&frames[0].body).unwrap();
        assert_eq!(body["content"], "hi");
        assert!(body.get("fileUrl").is_none());

        let body: serde_json::Value = serde_json::from_slice(&frames[1].body).unwrap();
        assert_eq!(body["fileUrl"], "https://f/cat.png");
        assert_eq!(body["fileName"], "cat.png");
        assert!(body.get("content").is_none());
        assert_eq!(serde_json::from_value::<SendMessageRequest>(body).unwrap(), attachment);
    }

    #[test]
    fn subscribe_is_idempotent_and_routes() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());

        assert!(session.subscribe(t0, Topic::RoomMessages(3), 7).is_empty());

        connect(&mut session, t0, "0,0");
        let first = session.subscribe(t0, Topic::RoomMessages(3), 7);
        assert!(session.subscribe(t0, Topic::RoomMessages(3), 8).is_empty());

        let subscribe = sent_frames(&first)[0].clone();
        assert_eq!(subscribe.header(headers::DESTINATION), Some("/sub/chat/rooms/3"));
        let id = subscribe.header(headers::ID).unwrap().to_string();

        let message = Frame::new(Command::Message).with_header(headers::SUBSCRIPTION, id.as_str());
        let actions = session.handle_packet(t0, Packet::Frame(message.clone())).unwrap();
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Deliver { topic: Topic::RoomMessages(3), handler: 7, .. }]
        ));

        session.unsubscribe(t0, Topic::RoomMessages(3));
        assert!(session.handle_packet(t0, Packet::Frame(message)).unwrap().is_empty());
    }

    #[test]
    fn receipt_confirms_subscription() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");

        let actions = session.subscribe(t0, Topic::RoomReadStatus(5), 0);
        let receipt = sent_frames(&actions)[0].header(headers::RECEIPT).unwrap().to_string();

        let ack = Frame::new(Command::Receipt).with_header(headers::RECEIPT_ID, receipt.as_str());
        let actions = session.handle_packet(t0, Packet::Frame(ack)).unwrap();

        assert_eq!(actions, vec![SessionAction::Receipt {
            receipt_id: receipt,
            topic: Some(Topic::RoomReadStatus(5)),
        }]);
        assert!(session.registry().is_confirmed(Topic::RoomReadStatus(5)));
    }

    #[test]
    fn unexpected_frame_is_an_error() {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::default());
        connect(&mut session, t0, "0,0");

        let result = session.handle_packet(t0, connected_frame("0,0"));
        assert!(matches!(
            result,
            Err(SessionError::UnexpectedFrame { command: Command::Connected, .. })
        ));
        assert!(session.is_connected());
    }
}
