//! WebSocket transport for the client.
//!
//! Provides [`ConnectedTransport`] which moves STOMP packets over a WebSocket.
//! This is a thin layer that only encodes and decodes packets; protocol logic
//! remains in the Sans-IO [`Client`](crate::Client).

use futures::{SinkExt, StreamExt};
use roomline_proto::Packet;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_tungstenite::{client_async, connect_async, tungstenite::Message};

use crate::TransportEvent;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket handshake failed.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Handle to an open WebSocket.
///
/// Packets are sent and received through the channels; an internal task
/// handles the socket I/O.
pub struct ConnectedTransport {
    /// Send packets to the broker.
    pub to_server: mpsc::Sender<Packet>,
    /// Packets and the close notification from the broker.
    pub from_server: mpsc::Receiver<TransportEvent>,
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedTransport {
    /// Stop the connection task, dropping the socket.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

impl Drop for ConnectedTransport {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Open a WebSocket to `url` (`ws://` or `wss://`).
///
/// # Errors
///
/// - `TransportError::Connection` if the WebSocket handshake fails
pub async fn connect(url: &str) -> Result<ConnectedTransport, TransportError> {
    let (socket, _response) =
        connect_async(url).await.map_err(|e| TransportError::Connection(e.to_string()))?;

    tracing::debug!(%url, "websocket open");
    Ok(spawn_connection(socket))
}

/// Run the WebSocket handshake for `url` over an already connected `stream`.
///
/// Used when the byte stream comes from somewhere other than the system
/// resolver, such as a simulated network. No TLS is layered on top.
///
/// # Errors
///
/// - `TransportError::Connection` if the WebSocket handshake fails
pub async fn connect_stream<S>(url: &str, stream: S) -> Result<ConnectedTransport, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (socket, _response) =
        client_async(url, stream).await.map_err(|e| TransportError::Connection(e.to_string()))?;

    tracing::debug!(%url, "websocket open over provided stream");
    Ok(spawn_connection(socket))
}

fn spawn_connection<S>(socket: S) -> ConnectedTransport
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin
        + Send
        + 'static,
{
    let (to_server_tx, to_server_rx) = mpsc::channel::<Packet>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<TransportEvent>(32);

    let handle = tokio::spawn(run_connection(socket, to_server_rx, from_server_tx));

    ConnectedTransport {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    }
}

/// Run the connection, bridging between channels and the socket.
async fn run_connection<S>(
    socket: S,
    mut to_server: mpsc::Receiver<Packet>,
    from_server: mpsc::Sender<TransportEvent>,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            outgoing = to_server.recv() => {
                let Some(packet) = outgoing else {
                    let _ = sink.send(Message::Close(None)).await;
                    break "closed by client".to_string();
                };
                let bytes = match packet.encode() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(error = %e, "dropping unencodable packet");
                        continue;
                    },
                };
                let message = match String::from_utf8(bytes) {
                    Ok(text) => Message::Text(text.into()),
                    Err(raw) => Message::Binary(raw.into_bytes().into()),
                };
                if let Err(e) = sink.send(message).await {
                    break format!("send failed: {e}");
                }
            },
            incoming = stream.next() => {
                let received = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(Message::Binary(data))) => data.to_vec(),
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(
                            || "closed by server".to_string(),
                            |f| format!("closed by server: {}", f.reason),
                        );
                    },
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break format!("receive failed: {e}"),
                    None => break "connection reset".to_string(),
                };

                match Packet::decode_all(&received) {
                    Ok(packets) => {
                        for packet in packets {
                            if from_server.send(TransportEvent::Packet(packet)).await.is_err() {
                                return;
                            }
                        }
                    },
                    Err(e) => tracing::error!(error = %e, "dropping undecodable websocket message"),
                }
            },
        }
    };

    tracing::debug!(%reason, "websocket closed");
    let _ = from_server.send(TransportEvent::Closed(reason)).await;
}
