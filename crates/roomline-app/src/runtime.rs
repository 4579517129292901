//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: navigation and view state
//! - [`Bridge`]: protocol bridge to the client
//! - [`Driver`]: platform-specific I/O
//!
//! Ticks fire every 250 ms on a deadline kept across cycles. A cycle whose
//! tick is due runs the tick; otherwise it races the driver's next input
//! against the time left until the deadline. Ticks drive heart-beats,
//! timeouts and reconnects, so a busy input stream cannot hold them off.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use roomline_client::{CredentialStore, Environment, SessionConfig};
use roomline_proto::{RoomId, UserId};
use thiserror::Error;

use crate::{App, AppAction, AppEvent, Bridge, Driver, DriverInput, bridge::IoRequest};

/// Interval between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// The driver failed.
    #[error("driver error: {0}")]
    Driver(#[source] E),
}

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment providing time and sleep
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    app: App,
    bridge: Bridge<E>,
    last_tick: Option<D::Instant>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a runtime for `user_id`.
    pub fn new(
        driver: D,
        env: E,
        user_id: UserId,
        credentials: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Self {
        let bridge = Bridge::new(env.clone(), user_id, credentials, config);
        Self { driver, env, app: App::new(), bridge, last_tick: None }
    }

    /// Run the main event loop until the user quits or input ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to render or read input.
    /// Transport failures are not errors; the session reconnects on its own.
    pub async fn run(&mut self, open: Option<RoomId>) -> Result<(), RuntimeError<D::Error>> {
        let mut should_quit = self.start(open).await?;
        while !should_quit {
            should_quit = self.step().await?;
        }

        self.driver.stop();
        Ok(())
    }

    /// Render, connect and load the room list. If `open` is set, that room is
    /// opened right away.
    ///
    /// Returns `true` if the application should quit.
    pub async fn start(&mut self, open: Option<RoomId>) -> Result<bool, RuntimeError<D::Error>> {
        self.driver.render(&self.app).map_err(RuntimeError::Driver)?;
        self.last_tick = Some(self.driver.now());

        let mut actions = self.app.connect();
        if let Some(room_id) = open {
            actions.extend(self.app.open(room_id));
        }
        self.process_actions(actions).await
    }

    /// Process one cycle of the event loop: one driver input or one tick.
    ///
    /// Returns `true` if the application should quit.
    pub async fn step(&mut self) -> Result<bool, RuntimeError<D::Error>> {
        let now = self.driver.now();
        let last_tick = *self.last_tick.get_or_insert(now);
        let until_tick = TICK_INTERVAL.saturating_sub(now - last_tick);

        let input = if until_tick.is_zero() {
            None
        } else {
            tokio::select! {
                biased;
                input = self.driver.next_input() => Some(input.map_err(RuntimeError::Driver)?),
                () = self.env.sleep(until_tick) => None,
            }
        };

        match input {
            Some(DriverInput::User(input)) => {
                let actions = self.app.handle(AppEvent::Input(input));
                self.process_actions(actions).await
            },
            Some(DriverInput::Transport(event)) => {
                let mut events = self.bridge.handle_transport(event);
                events.extend(self.flush_bridge().await);
                self.process_bridge_events(events).await
            },
            Some(DriverInput::Closed) => {
                tracing::debug!("input closed, shutting down");
                let actions = self.app.quit();
                self.process_actions(actions).await?;
                Ok(true)
            },
            None => {
                let now = self.driver.now();
                self.last_tick = Some(now);
                let mut events = self.bridge.handle_tick(now);
                events.extend(self.flush_bridge().await);
                events.push(AppEvent::Tick);
                self.process_bridge_events(events).await
            },
        }
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(
        &mut self,
        initial_actions: Vec<AppAction>,
    ) -> Result<bool, RuntimeError<D::Error>> {
        let mut pending: VecDeque<AppAction> = initial_actions.into();

        while let Some(action) = pending.pop_front() {
            let events = match action {
                AppAction::Render => {
                    self.driver.render(&self.app).map_err(RuntimeError::Driver)?;
                    self.app.clear_follow();
                    continue;
                },
                AppAction::Quit => return Ok(true),
                AppAction::LoadRooms => match self.driver.fetch_rooms().await {
                    Ok(rooms) => vec![AppEvent::RoomsLoaded(rooms)],
                    Err(e) => vec![AppEvent::Error { message: e.to_string() }],
                },
                AppAction::Upload { room_id, path } => match self.driver.upload(&path).await {
                    Ok((kind, file)) => vec![AppEvent::Uploaded { room_id, kind, file }],
                    Err(e) => vec![AppEvent::Error { message: e.to_string() }],
                },

                // Session operations go through the bridge
                AppAction::Connect
                | AppAction::Disconnect
                | AppAction::OpenRoom { .. }
                | AppAction::CloseRoom
                | AppAction::LoadOlder { .. }
                | AppAction::SendMessage { .. } => {
                    let mut events = self.bridge.process_app_action(action);
                    events.extend(self.flush_bridge().await);
                    events
                },
            };

            for event in events {
                pending.extend(self.app.handle(event));
            }
        }

        Ok(false)
    }

    /// Process events from Bridge back to App.
    async fn process_bridge_events(
        &mut self,
        events: Vec<AppEvent>,
    ) -> Result<bool, RuntimeError<D::Error>> {
        let mut actions = Vec::new();
        for event in events {
            actions.extend(self.app.handle(event));
        }
        self.process_actions(actions).await
    }

    /// Execute everything the bridge queued, until it stops queueing.
    ///
    /// Packets go out before requests, so a `DISCONNECT` is written before the
    /// transport closes.
    async fn flush_bridge(&mut self) -> Vec<AppEvent> {
        let mut events = Vec::new();

        loop {
            let packets = self.bridge.take_outgoing();
            let requests = self.bridge.take_requests();
            if packets.is_empty() && requests.is_empty() {
                return events;
            }

            for packet in packets {
                if let Err(e) = self.driver.send_packet(packet).await {
                    tracing::warn!(error = %e, "send failed, dropping transport");
                    self.driver.close_transport();
                    events.extend(self.bridge.transport_failed(e.to_string()));
                    break;
                }
            }

            for request in requests {
                match request {
                    IoRequest::OpenTransport => match self.driver.open_transport().await {
                        Ok(()) => events.extend(self.bridge.transport_opened()),
                        Err(reason) => events.extend(self.bridge.transport_failed(reason)),
                    },
                    IoRequest::CloseTransport => self.driver.close_transport(),
                    IoRequest::FetchHistory { room_id, before, size } => {
                        let result = self.driver.fetch_history(room_id, before, size).await;
                        events.extend(self.bridge.history_loaded(room_id, before, result));
                    },
                    IoRequest::UpdateLastRead { room_id, message_id } => {
                        if let Err(e) = self.driver.update_last_read(room_id, message_id).await {
                            tracing::warn!(room_id, error = %e, "last-read update failed");
                        }
                    },
                }
            }
        }
    }

    /// Get a reference to the App.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a reference to the Bridge.
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Get a reference to the Driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
