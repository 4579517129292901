//! STOMP 1.2 frame codec.
//!
//! A frame on the wire is:
//!
//! ```text
//! COMMAND EOL
//! (name:value EOL)*
//! EOL
//! body NUL
//! ```
//!
//! Between frames a peer may send bare EOLs. These are heart-beats and carry no
//! data, see [`Packet::Heartbeat`].
//!
//! # Invariants
//!
//! - Header escaping: header names and values are escaped (`\\`, `\r`, `\n`,
//!   `\c`) for every command except `CONNECT`, `STOMP` and `CONNECTED`, as the
//!   1.2 specification requires for backward compatibility.
//!
//! - Repeated headers: only the first occurrence of a header is significant.
//!   [`Frame::header`] always returns the first one.
//!
//! - Body length: when a `content-length` header is present the body is
//!   exactly that many bytes (and may contain NUL). Otherwise the body ends at
//!   the first NUL.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    HeartBeat,
    errors::{ProtocolError, Result},
};

/// Standard header names.
pub mod headers {
    /// Protocol versions the client accepts.
    pub const ACCEPT_VERSION: &str = "accept-version";
    /// Virtual host of the broker.
    pub const HOST: &str = "host";
    /// Heart-beat intervals `cx,cy` in milliseconds.
    pub const HEART_BEAT: &str = "heart-beat";
    /// Bearer credential carried by `CONNECT`.
    pub const AUTHORIZATION: &str = "Authorization";
    /// Negotiated protocol version in `CONNECTED`.
    pub const VERSION: &str = "version";
    /// Publish or subscribe destination.
    pub const DESTINATION: &str = "destination";
    /// Subscription id in `SUBSCRIBE` / `UNSUBSCRIBE`.
    pub const ID: &str = "id";
    /// Subscription id a `MESSAGE` was delivered for.
    pub const SUBSCRIPTION: &str = "subscription";
    /// Broker-assigned message id.
    pub const MESSAGE_ID: &str = "message-id";
    /// Receipt requested by the client.
    pub const RECEIPT: &str = "receipt";
    /// Receipt acknowledged by the broker.
    pub const RECEIPT_ID: &str = "receipt-id";
    /// MIME type of the body.
    pub const CONTENT_TYPE: &str = "content-type";
    /// Length of the body in bytes.
    pub const CONTENT_LENGTH: &str = "content-length";
    /// Short error description in `ERROR`.
    pub const MESSAGE: &str = "message";
}

/// STOMP protocol version this codec speaks.
pub const STOMP_VERSION: &str = "1.2";

/// MIME type for JSON bodies.
const JSON_CONTENT_TYPE: &str = "application/json";

/// STOMP frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Client handshake (1.2 alias of `CONNECT`).
    Stomp,
    /// Broker handshake reply.
    Connected,
    /// Publish to a destination.
    Send,
    /// Open a subscription.
    Subscribe,
    /// Close a subscription.
    Unsubscribe,
    /// Graceful client shutdown.
    Disconnect,
    /// Broker delivery for a subscription.
    Message,
    /// Broker acknowledgement of a `receipt` header.
    Receipt,
    /// Broker error.
    Error,
}

impl Command {
    /// Every command, in wire order of the 1.2 specification.
    pub const ALL: [Self; 10] = [
        Self::Connect,
        Self::Stomp,
        Self::Connected,
        Self::Send,
        Self::Subscribe,
        Self::Unsubscribe,
        Self::Disconnect,
        Self::Message,
        Self::Receipt,
        Self::Error,
    ];

    /// Command as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Parse a command line. `None` for unknown commands.
    pub fn parse(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == line)
    }

    /// Whether header escaping applies to this command.
    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order. Duplicates are kept; the first one wins.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Bytes,
}

impl Frame {
    /// Upper bound on an encoded frame (or a buffer of frames).
    pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

    /// Create a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: Bytes::new() }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replace the body with `value` serialized as JSON.
    pub fn with_json_body<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self.with_header(headers::CONTENT_TYPE, JSON_CONTENT_TYPE).with_body(body))
    }

    /// First value of header `name`. `None` if absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Client handshake frame.
    ///
    /// The `Authorization` header is omitted when no token is available; the
    /// broker then rejects the handshake, which the session treats like any
    /// other connection failure.
    pub fn connect(host: &str, heart_beat: HeartBeat, token: Option<&str>) -> Self {
        let frame = Self::new(Command::Connect)
            .with_header(headers::ACCEPT_VERSION, STOMP_VERSION)
            .with_header(headers::HOST, host)
            .with_header(headers::HEART_BEAT, heart_beat.to_string());

        match token {
            Some(token) => frame.with_header(headers::AUTHORIZATION, format!("Bearer {token}")),
            None => frame,
        }
    }

    /// Subscribe frame, optionally asking for a receipt.
    pub fn subscribe(id: &str, destination: &str, receipt: Option<&str>) -> Self {
        let frame = Self::new(Command::Subscribe)
            .with_header(headers::ID, id)
            .with_header(headers::DESTINATION, destination);

        match receipt {
            Some(receipt) => frame.with_header(headers::RECEIPT, receipt),
            None => frame,
        }
    }

    /// Unsubscribe frame.
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header(headers::ID, id)
    }

    /// Publish `value` as JSON to `destination`.
    pub fn send_json<T: Serialize>(destination: &str, value: &T) -> Result<Self> {
        Self::new(Command::Send)
            .with_header(headers::DESTINATION, destination)
            .with_json_body(value)
    }

    /// Graceful disconnect frame.
    pub fn disconnect(receipt: Option<&str>) -> Self {
        let frame = Self::new(Command::Disconnect);
        match receipt {
            Some(receipt) => frame.with_header(headers::RECEIPT, receipt),
            None => frame,
        }
    }

    /// Encode to wire bytes.
    ///
    /// A `content-length` header is computed from the body whenever the body
    /// is non-empty; any caller-supplied `content-length` is dropped so the
    /// two can never disagree.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooLarge` if the encoded frame exceeds
    ///   [`Frame::MAX_FRAME_SIZE`]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let escape = self.command.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());

        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');

        for (name, value) in &self.headers {
            if name == headers::CONTENT_LENGTH {
                continue;
            }
            write_header_part(&mut out, name, escape);
            out.push(b':');
            write_header_part(&mut out, value, escape);
            out.push(b'\n');
        }

        if !self.body.is_empty() {
            out.extend_from_slice(headers::CONTENT_LENGTH.as_bytes());
            out.push(b':');
            out.extend_from_slice(self.body.len().to_string().as_bytes());
            out.push(b'\n');
        }

        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);

        if out.len() > Self::MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge { size: out.len(), max: Self::MAX_FRAME_SIZE });
        }

        Ok(out)
    }

    /// Decode exactly one frame.
    ///
    /// Leading and trailing EOLs are tolerated (they are heart-beats glued to
    /// the frame). Anything else after the NUL is rejected.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Empty` if the buffer holds only EOLs
    /// - `ProtocolError::TrailingBytes` if data follows the frame
    /// - any framing error from the head or body
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > Self::MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: bytes.len(),
                max: Self::MAX_FRAME_SIZE,
            });
        }

        let start = skip_eols(bytes, 0);
        let rest = bytes.get(start..).unwrap_or_default();
        if rest.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (frame, used) = Self::decode_prefix(rest)?;
        let end = skip_eols(rest, used);
        if end != rest.len() {
            return Err(ProtocolError::TrailingBytes(rest.len() - end));
        }

        Ok(frame)
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Returns the frame and the number of bytes consumed, including the NUL.
    fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut pos = 0;

        let command_line = next_line(bytes, &mut pos)?;
        let command = Command::parse(command_line)
            .ok_or_else(|| ProtocolError::UnknownCommand(command_line.to_string()))?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        loop {
            let line = next_line(bytes, &mut pos)?;
            if line.is_empty() {
                break;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;

            if escape {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(n, _)| n == headers::CONTENT_LENGTH)
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| ProtocolError::InvalidContentLength(v.clone()))
            })
            .transpose()?;

        let available = bytes.len().saturating_sub(pos);
        let body_len = match content_length {
            Some(len) => {
                if available <= len {
                    return Err(ProtocolError::FrameTruncated { expected: len, actual: available });
                }
                if bytes.get(pos + len) != Some(&0) {
                    return Err(ProtocolError::MissingTerminator);
                }
                len
            },
            None => bytes
                .get(pos..)
                .and_then(|tail| tail.iter().position(|b| *b == 0))
                .ok_or(ProtocolError::MissingTerminator)?,
        };

        let body = Bytes::copy_from_slice(bytes.get(pos..pos + body_len).unwrap_or_default());

        Ok((Self { command, headers, body }, pos + body_len + 1))
    }
}

/// Unit of traffic on the connection: a frame or a heart-beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Bare EOL keep-alive.
    Heartbeat,
    /// A complete frame.
    Frame(Frame),
}

impl Packet {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Heartbeat => Ok(vec![b'\n']),
            Self::Frame(frame) => frame.encode(),
        }
    }

    /// Decode every packet in a buffer.
    ///
    /// A WebSocket message may carry several frames back to back. EOLs between
    /// frames are consumed silently; a buffer holding only EOLs decodes to a
    /// single [`Packet::Heartbeat`].
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Empty` for an empty buffer
    /// - the first framing error encountered; earlier frames are discarded
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<Self>> {
        if bytes.len() > Frame::MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: bytes.len(),
                max: Frame::MAX_FRAME_SIZE,
            });
        }

        let mut packets = Vec::new();
        let mut saw_eol = false;
        let mut pos = 0;

        loop {
            let next = skip_eols(bytes, pos);
            saw_eol |= next > pos;
            pos = next;

            let Some(rest) = bytes.get(pos..).filter(|r| !r.is_empty()) else {
                break;
            };

            let (frame, used) = Frame::decode_prefix(rest)?;
            packets.push(Self::Frame(frame));
            pos += used;
        }

        if packets.is_empty() {
            return if saw_eol { Ok(vec![Self::Heartbeat]) } else { Err(ProtocolError::Empty) };
        }

        Ok(packets)
    }
}

impl From<Frame> for Packet {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}

/// Advance `pos` past any `\n` or `\r\n` sequences.
fn skip_eols(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        match (bytes.get(pos), bytes.get(pos + 1)) {
            (Some(b'\n'), _) => pos += 1,
            (Some(b'\r'), Some(b'\n')) => pos += 2,
            _ => return pos,
        }
    }
}

/// Read one line starting at `pos`, without its EOL.
fn next_line<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<&'a str> {
    let tail = bytes.get(*pos..).ok_or(ProtocolError::IncompleteHead)?;
    let len = tail.iter().position(|b| *b == b'\n').ok_or(ProtocolError::IncompleteHead)?;

    let mut line = tail.get(..len).unwrap_or_default();
    if let Some(stripped) = line.strip_suffix(b"\r") {
        line = stripped;
    }
    *pos += len + 1;

    std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)
}

fn write_header_part(out: &mut Vec<u8>, raw: &str, escape: bool) {
    if !escape {
        out.extend_from_slice(raw.as_bytes());
        return;
    }

    for ch in raw.chars() {
        match ch {
            '\\' => out.extend_from_slice(b"\\\\"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\n' => out.extend_from_slice(b"\\n"),
            ':' => out.extend_from_slice(b"\\c"),
            other => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            },
        }
    }
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(ProtocolError::InvalidEscape(raw.to_string())),
        }
    }

    Ok(out)
}
