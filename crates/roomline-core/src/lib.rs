//! Roomline client core
//!
//! Sans-IO state machines for a chat client that keeps one STOMP connection to
//! a broker and multiplexes per-user and per-room topics over it. Nothing here
//! touches a socket or a clock: callers pass the current time in and execute
//! the actions that come back.
//!
//! - [`TransportSession`]: connection lifecycle, handshake, heart-beats,
//!   reconnect back-off, publish/subscribe primitives
//! - [`SubscriptionRegistry`]: at most one live subscription per topic
//! - [`RoomUpdateCache`]: latest live room-list update per room
//! - [`RoomTimeline`]: message timeline and read-state of the open room
//! - [`compose`]: pure merge of REST baselines with the live caches

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
pub mod compose;
pub mod env;
pub mod error;
mod registry;
mod session;
mod timeline;

pub use cache::{CacheSnapshot, RoomUpdateCache};
pub use env::Environment;
pub use error::SessionError;
pub use registry::{Registration, SubscriptionHandle, SubscriptionRegistry};
pub use session::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT, DEFAULT_RECONNECT_DELAY, DisconnectReason,
    SessionAction, SessionConfig, SessionState, TransportSession,
};
pub use timeline::{PAGE_SIZE, RoomTimeline, TimelineEffect};
