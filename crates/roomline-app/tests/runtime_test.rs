//! Runtime tests on tokio's paused clock.
//!
//! A scripted driver plays the broker: it answers `CONNECT` and then feeds
//! inbound traffic at a fixed rate, recording every packet and REST call the
//! runtime makes.

use std::{collections::VecDeque, convert::Infallible, path::Path, sync::Arc, time::Duration};

use chrono::NaiveDateTime;
use roomline_app::{App, Driver, DriverInput, Runtime};
use roomline_client::{ApiError, Environment, MemoryCredentialStore, SessionConfig, TransportEvent};
use roomline_proto::{
    Command, Frame, MessageId, Packet, RoomId, headers,
    payloads::{ChatMessage, MessageKind, RoomSummary, UploadedFile},
};
use tokio::time::Instant;

const ROOM: RoomId = 5;

#[derive(Clone)]
struct PausedEnv;

impl Environment for PausedEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Driver that keeps the runtime busy.
#[derive(Default)]
struct BusyDriver {
    /// Inbound packets delivered before anything else.
    inbox: VecDeque<Packet>,
    every: Duration,
    /// Broker heart-beats still to send, one per `every`.
    beats: usize,
    history: Vec<ChatMessage>,
    sent: Vec<Packet>,
    last_read: Vec<(RoomId, MessageId)>,
}

impl BusyDriver {
    fn heart_beats_sent(&self) -> usize {
        self.sent.iter().filter(|p| matches!(p, Packet::Heartbeat)).count()
    }
}

impl Driver for BusyDriver {
    type Error = Infallible;
    type Instant = Instant;

    async fn next_input(&mut self) -> Result<DriverInput, Self::Error> {
        if let Some(packet) = self.inbox.pop_front() {
            return Ok(DriverInput::Transport(TransportEvent::Packet(packet)));
        }
        if self.beats == 0 {
            return Ok(DriverInput::Closed);
        }

        tokio::time::sleep(self.every).await;
        self.beats -= 1;
        Ok(DriverInput::Transport(TransportEvent::Packet(Packet::Heartbeat)))
    }

    async fn open_transport(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn close_transport(&mut self) {}

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        if let Packet::Frame(frame) = &packet {
            if frame.command == Command::Connect {
                let ack = Frame::new(Command::Connected);
                let ack = ack.with_header(headers::HEART_BEAT, "4000,4000");
                self.inbox.push_back(Packet::Frame(ack));
            }
            if let Some(receipt) = frame.header(headers::RECEIPT) {
                let ack = Frame::new(Command::Receipt).with_header(headers::RECEIPT_ID, receipt);
                self.inbox.push_back(Packet::Frame(ack));
            }
        }
        self.sent.push(packet);
        Ok(())
    }

    async fn fetch_rooms(&mut self) -> Result<Vec<RoomSummary>, ApiError> {
        Ok(Vec::new())
    }

    async fn fetch_history(
        &mut self,
        _room_id: RoomId,
        before: Option<MessageId>,
        _size: usize,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        Ok(if before.is_none() { self.history.clone() } else { Vec::new() })
    }

    async fn update_last_read(
        &mut self,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<(), ApiError> {
        self.last_read.push((room_id, message_id));
        Ok(())
    }

    async fn upload(&mut self, _path: &Path) -> Result<(MessageKind, UploadedFile), ApiError> {
        Err(ApiError::MissingData)
    }

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, _app: &App) -> Result<(), Self::Error> {
        Ok(())
    }

    fn stop(&mut self) {}
}

fn message(id: MessageId) -> ChatMessage {
    ChatMessage {
        message_id: id,
        room_id: ROOM,
        sender_id: 2,
        sender_nickname: "bo".into(),
        sender_profile_image_url: None,
        kind: MessageKind::Text,
        content: Some(format!("message {id}")),
        file_url: None,
        file_name: None,
        created_at: NaiveDateTime::default(),
        unread_count: 1,
    }
}

fn runtime(driver: BusyDriver) -> Runtime<BusyDriver, PausedEnv> {
    let credentials = Arc::new(MemoryCredentialStore::new());
    Runtime::new(driver, PausedEnv, 1, credentials, SessionConfig::default())
}

#[tokio::test(start_paused = true)]
async fn heart_beats_go_out_while_input_keeps_arriving() {
    let driver = BusyDriver { every: Duration::from_millis(100), beats: 200, ..Default::default() };
    let mut runtime = runtime(driver);
    let start = Instant::now();

    runtime.run(None).await.unwrap();

    // Twenty seconds of inbound traffic, one beat owed every four
    let elapsed = Instant::now() - start;
    assert!(elapsed >= Duration::from_secs(19), "elapsed {elapsed:?}");
    assert!(runtime.driver().heart_beats_sent() >= 4);
}

#[tokio::test(start_paused = true)]
async fn opening_a_room_persists_the_last_read_marker() {
    let driver = BusyDriver {
        history: vec![message(3), message(4)],
        every: Duration::from_millis(100),
        beats: 1,
        ..Default::default()
    };
    let mut runtime = runtime(driver);

    runtime.run(Some(ROOM)).await.unwrap();

    assert_eq!(runtime.driver().last_read, vec![(ROOM, 4)]);
}
