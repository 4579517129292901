//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer held no frame at all.
    #[error("empty frame")]
    Empty,

    /// Command line is not a known STOMP command.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// Header line has no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// Header contains an undefined escape sequence.
    #[error("invalid header escape in {0:?}")]
    InvalidEscape(String),

    /// Frame ended inside the command or header section.
    #[error("frame head incomplete")]
    IncompleteHead,

    /// Bytes other than EOLs follow the frame terminator.
    #[error("{0} unexpected bytes after frame")]
    TrailingBytes(usize),

    /// Frame text is not valid UTF-8.
    #[error("frame head is not valid UTF-8")]
    InvalidUtf8,

    /// `content-length` header is not a number.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    /// Frame ended before the terminating NUL.
    #[error("frame truncated: expected {expected} body bytes, got {actual}")]
    FrameTruncated {
        /// Body bytes announced or required.
        expected: usize,
        /// Body bytes actually available.
        actual: usize,
    },

    /// Frame body is not followed by NUL.
    #[error("frame body not terminated by NUL")]
    MissingTerminator,

    /// Frame exceeds the size limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the frame.
        size: usize,
        /// Maximum accepted size.
        max: usize,
    },

    /// `heart-beat` header is malformed.
    #[error("invalid heart-beat header: {0:?}")]
    InvalidHeartBeat(String),

    /// Destination or topic string is not recognized.
    #[error("unknown destination: {0:?}")]
    UnknownDestination(String),

    /// JSON body could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
