//! Line-mode driver for the CLI.
//!
//! Implements the [`Driver`] trait over a line reader (stdin in production),
//! an appending writer (stdout), the tokio-tungstenite WebSocket transport and
//! the REST collaborators. Orchestration stays in [`roomline_app::Runtime`].

use std::{io::Write, path::Path, sync::Arc, time::Instant};

use roomline_app::{App, Driver, DriverInput, InputError, UserInput};
use roomline_client::{
    ApiError, TransportEvent,
    api::{ChatApi, FileApi},
    transport::{self, ConnectedTransport},
};
use roomline_proto::{
    MessageId, Packet, RoomId,
    payloads::{ChatMessage, MessageKind, RoomSummary, UploadedFile},
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::{Renderer, error::DriverError};

/// What woke `next_input` up.
enum Wake {
    Transport(Option<TransportEvent>),
    Line(Option<String>),
}

/// CLI driver implementing the [`Driver`] trait.
///
/// Reads commands and message text line by line from `R`, writes incremental
/// output to `W` and calls the REST API through `A`.
pub struct CliDriver<R, W, A> {
    ws_url: String,
    api: Arc<A>,
    input: Lines<R>,
    transport: Option<ConnectedTransport>,
    out: W,
    renderer: Renderer,
}

impl<R, W, A> CliDriver<R, W, A>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
    A: ChatApi + FileApi + 'static,
{
    /// Create a driver that connects to `ws_url`.
    pub fn new(ws_url: impl Into<String>, api: Arc<A>, input: R, out: W) -> Self {
        Self {
            ws_url: ws_url.into(),
            api,
            input: input.lines(),
            transport: None,
            out,
            renderer: Renderer::new(),
        }
    }

    /// Everything written so far.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Whether a WebSocket is open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }
}

async fn recv_transport(transport: &mut Option<ConnectedTransport>) -> Option<TransportEvent> {
    match transport {
        Some(transport) => transport.from_server.recv().await,
        None => std::future::pending().await,
    }
}

impl<R, W, A> Driver for CliDriver<R, W, A>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
    A: ChatApi + FileApi + 'static,
{
    type Error = DriverError;
    type Instant = Instant;

    async fn next_input(&mut self) -> Result<DriverInput, Self::Error> {
        loop {
            // Both receivers are cancel-safe
            let wake = {
                let Self { input, transport, .. } = self;
                tokio::select! {
                    event = recv_transport(transport) => Wake::Transport(event),
                    line = input.next_line() => Wake::Line(line?),
                }
            };

            match wake {
                Wake::Transport(Some(event)) => {
                    if matches!(event, TransportEvent::Closed(_)) {
                        self.transport = None;
                    }
                    return Ok(DriverInput::Transport(event));
                },
                Wake::Transport(None) => {
                    self.transport = None;
                    let reason = "transport task ended".to_string();
                    return Ok(DriverInput::Transport(TransportEvent::Closed(reason)));
                },
                Wake::Line(None) => return Ok(DriverInput::Closed),
                Wake::Line(Some(line)) => match UserInput::parse(&line) {
                    Ok(input) => return Ok(DriverInput::User(input)),
                    Err(InputError::Empty) => {},
                    Err(e) => {
                        writeln!(self.out, "! {e}")?;
                        self.out.flush()?;
                    },
                },
            }
        }
    }

    async fn open_transport(&mut self) -> Result<(), String> {
        self.close_transport();

        let transport = transport::connect(&self.ws_url).await.map_err(|e| e.to_string())?;
        self.transport = Some(transport);
        Ok(())
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.stop();
        }
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        let transport = self.transport.as_ref().ok_or(DriverError::NotConnected)?;
        transport.to_server.send(packet).await.map_err(|_| DriverError::ChannelSend)
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
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::File(format!("{}: {e}", path.display())))?;

        let mime = MessageKind::guess_mime(file_name);
        tracing::debug!(file_name, mime, size = bytes.len(), "uploading");

        let file = self.api.upload(file_name, mime, bytes).await?;
        Ok((MessageKind::for_mime(mime), file))
    }

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        for line in self.renderer.render(app) {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        self.close_transport();
    }
}
