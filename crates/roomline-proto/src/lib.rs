//! Roomline wire protocol
//!
//! The broker speaks STOMP 1.2 over a WebSocket. This crate owns everything
//! that crosses that wire and nothing else:
//!
//! - [`Frame`] / [`Packet`]: STOMP frame codec (text framing, header escaping,
//!   `content-length` bodies, EOL heart-beats)
//! - [`HeartBeat`]: `heart-beat` header parsing and negotiation
//! - [`Topic`]: logical publish/subscribe topics and their broker destinations
//! - [`payloads`]: JSON bodies carried by `SEND` and `MESSAGE` frames, plus the
//!   REST envelope types shared with the HTTP collaborators
//!
//! There is no I/O here. Session semantics live in `roomline-core`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
mod heartbeat;
pub mod payloads;
mod topic;

pub use errors::{ProtocolError, Result};
pub use frame::{Command, Frame, Packet, headers};
pub use heartbeat::HeartBeat;
pub use topic::{MessageId, RoomId, Topic, UserId};
