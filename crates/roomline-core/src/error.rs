//! Error types for the session layer.

use std::time::Duration;

use roomline_proto::{Command, ProtocolError, Topic};
use thiserror::Error;

use crate::session::SessionState;

/// Errors raised by the transport session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation is not valid in the current state.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// State when the operation was attempted.
        state: SessionState,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// Broker sent a frame that makes no sense in the current state.
    #[error("unexpected {command} frame in state {state:?}")]
    UnexpectedFrame {
        /// State when the frame arrived.
        state: SessionState,
        /// Command of the frame.
        command: Command,
    },

    /// Broker answered `CONNECT` with `ERROR`.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// `CONNECTED` did not arrive in time.
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// How long we waited.
        elapsed: Duration,
    },

    /// Nothing arrived from the broker for too long.
    #[error("heart-beat timeout after {elapsed:?}")]
    HeartbeatTimeout {
        /// Time since the last inbound packet.
        elapsed: Duration,
    },

    /// Topic has no publish destination.
    #[error("topic {0} cannot be published to")]
    NotPublishable(Topic),

    /// Frame or payload could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport failed or closed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Whether this error ends the connection and schedules a reconnect.
    ///
    /// Misuse errors (`InvalidState`, `UnexpectedFrame`, `NotPublishable`)
    /// leave the connection as it is.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::HandshakeRejected(_)
                | Self::HandshakeTimeout { .. }
                | Self::HeartbeatTimeout { .. }
                | Self::Transport(_)
        )
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_rejections_are_connection_failures() {
        assert!(SessionError::HandshakeRejected("bad token".into()).is_connection_failure());
        assert!(
            SessionError::HandshakeTimeout { elapsed: Duration::from_secs(31) }
                .is_connection_failure()
        );
        assert!(
            SessionError::HeartbeatTimeout { elapsed: Duration::from_secs(9) }
                .is_connection_failure()
        );
        assert!(SessionError::Transport("reset".into()).is_connection_failure());
    }

    #[test]
    fn misuse_is_not_a_connection_failure() {
        assert!(
            !SessionError::InvalidState { state: SessionState::Disconnected, operation: "x" }
                .is_connection_failure()
        );
        assert!(!SessionError::NotPublishable(Topic::UserRooms(1)).is_connection_failure());
        assert!(!SessionError::Protocol("bad json".into()).is_connection_failure());
    }
}
