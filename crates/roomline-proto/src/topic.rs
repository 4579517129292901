//! Logical topics and their broker destinations.
//!
//! The broker exposes two destination prefixes: `/sub/...` for subscriptions
//! and `/pub/...` for publishing. A [`Topic`] names the logical stream and maps
//! to both sides where they exist. The per-user room feed is subscribe-only.

use std::{fmt, str::FromStr};

use crate::errors::ProtocolError;

/// Room identifier.
pub type RoomId = u64;

/// User identifier.
pub type UserId = u64;

/// Message identifier, monotonic within a room.
pub type MessageId = i64;

/// A logical publish/subscribe stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Room-list updates addressed to one user.
    UserRooms(UserId),
    /// Chat messages of one room.
    RoomMessages(RoomId),
    /// Read receipts of one room.
    RoomReadStatus(RoomId),
}

impl Topic {
    /// Destination used in `SUBSCRIBE`.
    pub fn subscribe_destination(&self) -> String {
        match self {
            Self::UserRooms(user) => format!("/sub/users/{user}/rooms"),
            Self::RoomMessages(room) => format!("/sub/chat/rooms/{room}"),
            Self::RoomReadStatus(room) => format!("/sub/chat/rooms/{room}/read"),
        }
    }

    /// Destination used in `SEND`. `None` for subscribe-only topics.
    pub fn publish_destination(&self) -> Option<String> {
        match self {
            Self::UserRooms(_) => None,
            Self::RoomMessages(room) => Some(format!("/pub/chat/rooms/{room}")),
            Self::RoomReadStatus(room) => Some(format!("/pub/chat/rooms/{room}/read")),
        }
    }

    /// Map a subscribe destination back to its topic.
    pub fn from_destination(destination: &str) -> Result<Self, ProtocolError> {
        let unknown = || ProtocolError::UnknownDestination(destination.to_string());
        let parts: Vec<&str> = destination.split('/').collect();

        match parts.as_slice() {
            ["", "sub", "users", id, "rooms"] => {
                Ok(Self::UserRooms(id.parse().map_err(|_| unknown())?))
            },
            ["", "sub", "chat", "rooms", id] => {
                Ok(Self::RoomMessages(id.parse().map_err(|_| unknown())?))
            },
            ["", "sub", "chat", "rooms", id, "read"] => {
                Ok(Self::RoomReadStatus(id.parse().map_err(|_| unknown())?))
            },
            _ => Err(unknown()),
        }
    }

    /// Room the topic belongs to, if any.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::UserRooms(_) => None,
            Self::RoomMessages(room) | Self::RoomReadStatus(room) => Some(*room),
        }
    }

    /// Both topics a room view subscribes to.
    pub fn room_topics(room: RoomId) -> [Self; 2] {
        [Self::RoomMessages(room), Self::RoomReadStatus(room)]
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRooms(user) => write!(f, "rooms-of-user/{user}"),
            Self::RoomMessages(room) => write!(f, "room/{room}/messages"),
            Self::RoomReadStatus(room) => write!(f, "room/{room}/read-status"),
        }
    }
}

impl FromStr for Topic {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ProtocolError::UnknownDestination(s.to_string());
        let parts: Vec<&str> = s.split('/').collect();

        match parts.as_slice() {
            ["rooms-of-user", id] => Ok(Self::UserRooms(id.parse().map_err(|_| unknown())?)),
            ["room", id, "messages"] => Ok(Self::RoomMessages(id.parse().map_err(|_| unknown())?)),
            ["room", id, "read-status"] => {
                Ok(Self::RoomReadStatus(id.parse().map_err(|_| unknown())?))
            },
            _ => Err(unknown()),
        }
    }
}
