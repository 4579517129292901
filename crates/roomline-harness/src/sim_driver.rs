//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the CLI driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`roomline_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! User input comes from a [`Scenario`], the transport is a connection to a
//! shared [`SimBroker`](crate::SimBroker) and REST calls go to a [`SimApi`].
//! Time is tokio's paused clock.

use std::{collections::VecDeque, path::Path};

use roomline_app::{App, ConnectionState, Driver, DriverInput, Screen};
use roomline_client::{
    ApiError, TransportEvent,
    api::{ChatApi, FileApi},
};
use roomline_proto::{
    MessageId, Packet, RoomId, UserId,
    payloads::{ChatMessage, MessageKind, RoomSummary, UploadedFile},
};

use crate::{
    SimApi,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot},
    scenario::{Scenario, ScriptStep},
    sim_broker::{ConnectionId, SharedSimBroker, lock_broker},
};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// What one render showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRecord {
    /// Connection indicator.
    pub connection: ConnectionState,
    /// Visible screen.
    pub screen: Screen,
    /// Room list in display order.
    pub rooms: Vec<RoomId>,
    /// Open room's message ids.
    pub messages: Vec<MessageId>,
    /// Status line.
    pub status: Option<String>,
}

impl RenderRecord {
    fn of(app: &App) -> Self {
        Self {
            connection: app.connection_state(),
            screen: app.screen(),
            rooms: app.rooms().iter().map(|r| r.id).collect(),
            messages: app.room_view().messages.iter().map(|m| m.message_id).collect(),
            status: app.status_message().map(str::to_string),
        }
    }
}

/// Simulation driver for deterministic testing.
///
/// Implements [`Driver`] trait so the same [`roomline_app::Runtime`]
/// orchestration code runs in both the CLI and simulation tests.
pub struct SimDriver {
    user_id: UserId,
    broker: SharedSimBroker,
    api: SimApi,
    connection: Option<ConnectionId>,
    script: VecDeque<ScriptStep>,
    /// Deadline of the `Wait` step in progress.
    wait_until: Option<tokio::time::Instant>,
    invariants: Option<InvariantRegistry>,
    renders: Vec<RenderRecord>,
    stopped: bool,
}

impl SimDriver {
    /// Create a driver for `user_id` that plays `scenario` against `broker`.
    pub fn new(user_id: UserId, broker: SharedSimBroker, scenario: Scenario) -> Self {
        let api = SimApi::new(broker.clone(), user_id);
        Self {
            user_id,
            broker,
            api,
            connection: None,
            script: scenario.into_steps(),
            wait_until: None,
            invariants: None,
            renders: Vec::new(),
            stopped: false,
        }
    }

    /// Check `registry` against the App on every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// The simulated user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The broker this driver talks to.
    pub fn broker(&self) -> &SharedSimBroker {
        &self.broker
    }

    /// Open broker connection, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Every render so far.
    pub fn renders(&self) -> &[RenderRecord] {
        &self.renders
    }

    /// The latest render.
    pub fn last_render(&self) -> Option<&RenderRecord> {
        self.renders.last()
    }

    /// Append `scenario` to the script.
    pub fn extend_script(&mut self, scenario: Scenario) {
        self.script.extend(scenario.into_steps());
    }

    /// Script steps not yet played.
    pub fn remaining_steps(&self) -> usize {
        self.script.len()
    }

    /// Whether the script is played out and the broker has nothing queued
    /// for us.
    pub fn is_idle(&self) -> bool {
        self.script.is_empty()
            && self.connection.is_none_or(|c| !lock_broker(&self.broker).has_pending(c))
    }

    /// Whether the runtime has stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Next event the broker queued for our connection.
    ///
    /// Taking the close forgets the connection.
    fn take_transport_event(&mut self) -> Option<TransportEvent> {
        let connection = self.connection?;
        let event = lock_broker(&self.broker).take_event(connection);
        if matches!(event, Some(TransportEvent::Closed(_))) {
            self.connection = None;
        }
        event
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = tokio::time::Instant;

    async fn next_input(&mut self) -> Result<DriverInput, Self::Error> {
        loop {
            if let Some(event) = self.take_transport_event() {
                return Ok(DriverInput::Transport(event));
            }

            let Some(step) = self.script.pop_front() else {
                return Ok(DriverInput::Closed);
            };

            match step {
                ScriptStep::Input(input) => return Ok(DriverInput::User(input)),
                ScriptStep::Wait(duration) => {
                    // Cancelled waits resume with the same deadline
                    let deadline = *self
                        .wait_until
                        .get_or_insert_with(|| tokio::time::Instant::now() + duration);
                    self.script.push_front(ScriptStep::Wait(duration));
                    tokio::time::sleep_until(deadline).await;
                    self.script.pop_front();
                    self.wait_until = None;
                },
                ScriptStep::Broker(action) => {
                    let mut broker = lock_broker(&self.broker);
                    action(&mut broker);
                },
            }
        }
    }

    async fn open_transport(&mut self) -> Result<(), String> {
        self.close_transport();
        let connection = lock_broker(&self.broker).open()?;
        self.connection = Some(connection);
        Ok(())
    }

    fn close_transport(&mut self) {
        if let Some(connection) = self.connection.take() {
            lock_broker(&self.broker).close(connection);
        }
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        let connection = self.connection.ok_or_else(|| SimDriverError("not connected".into()))?;

        let mut broker = lock_broker(&self.broker);
        if !broker.is_open(connection) {
            return Err(SimDriverError("connection reset".into()));
        }
        broker.receive(connection, packet);
        Ok(())
    }

    async fn fetch_rooms(&mut self) -> Result<Vec<RoomSummary>, ApiError> {
        self.api.list_rooms().await
    }

    async fn fetch_history(
        &mut self,
        room_id: RoomId,
        before: Option<MessageId>,
        size: usize,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        self.api.messages(room_id, before, size).await
    }

    async fn update_last_read(
        &mut self,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<(), ApiError> {
        self.api.update_last_read(room_id, message_id).await
    }

    async fn upload(&mut self, path: &Path) -> Result<(MessageKind, UploadedFile), ApiError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ApiError::File(format!("{} has no file name", path.display())))?;
        let mime = MessageKind::guess_mime(file_name);

        let file = self.api.upload(file_name, mime, Vec::new()).await?;
        Ok((MessageKind::for_mime(mime), file))
    }

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        self.renders.push(RenderRecord::of(app));

        if let Some(registry) = &self.invariants {
            let snapshot = SystemSnapshot::single(ClientSnapshot::from_app(app));
            if let Err(violations) = registry.check_all(&snapshot) {
                let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
                return Err(SimDriverError(messages.join("; ")));
            }
        }

        Ok(())
    }

    fn stop(&mut self) {
        self.close_transport();
        self.stopped = true;
    }
}
