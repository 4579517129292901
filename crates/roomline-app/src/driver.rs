//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, path::Path, time::Duration};

use roomline_client::{ApiError, TransportEvent};
use roomline_proto::{
    MessageId, Packet, RoomId,
    payloads::{ChatMessage, MessageKind, RoomSummary, UploadedFile},
};

use crate::{App, UserInput};

/// Something the driver observed while waiting.
#[derive(Debug, Clone)]
pub enum DriverInput {
    /// User intent.
    User(UserInput),
    /// Packet or close notification from the open transport.
    Transport(TransportEvent),
    /// The user's input source is exhausted.
    Closed,
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. The same
/// orchestration code runs in the CLI and in simulation.
///
/// # Implementations
///
/// - **CLI**: stdin lines, a tokio-tungstenite WebSocket and the `reqwest`
///   REST client
/// - **Simulation**: scripted input and an in-memory broker
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Wait for the next user input or transport event.
    ///
    /// Must be cancel-safe: the runtime races it against the tick timer.
    fn next_input(&mut self) -> impl Future<Output = Result<DriverInput, Self::Error>> + Send;

    /// Open the transport.
    ///
    /// # Errors
    ///
    /// Returns the reason the transport could not be opened. The runtime
    /// treats this as a connection failure, not a fatal error.
    fn open_transport(&mut self) -> impl Future<Output = Result<(), String>> + Send;

    /// Close the transport. No-op if it is not open.
    fn close_transport(&mut self);

    /// Send a packet on the open transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is gone.
    fn send_packet(
        &mut self,
        packet: Packet,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Fetch the room list.
    fn fetch_rooms(&mut self) -> impl Future<Output = Result<Vec<RoomSummary>, ApiError>> + Send;

    /// Fetch a history page.
    fn fetch_history(
        &mut self,
        room_id: RoomId,
        before: Option<MessageId>,
        size: usize,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, ApiError>> + Send;

    /// Persist the last-read marker of `room_id`.
    fn update_last_read(
        &mut self,
        room_id: RoomId,
        message_id: MessageId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Upload a local file. Returns the attachment kind and where it is served.
    fn upload(
        &mut self,
        path: &Path,
    ) -> impl Future<Output = Result<(MessageKind, UploadedFile), ApiError>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Stop the transport and clean up resources.
    fn stop(&mut self);
}
