//! Client error types.

use roomline_core::SessionError;
use thiserror::Error;

/// Errors returned by [`Client::handle`](crate::Client::handle).
///
/// Transport faults are not errors: they show up as
/// [`ClientAction::Disconnected`](crate::ClientAction::Disconnected).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Session rejected the operation.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The operation needs a user but `Connect` was never received.
    #[error("cannot {operation} before connect")]
    NoIdentity {
        /// Operation that was attempted.
        operation: &'static str,
    },
}

/// Errors from a [`CredentialStore`](crate::CredentialStore).
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Token file could not be read or written.
    #[error("token file error: {0}")]
    Io(#[from] std::io::Error),

    /// Token file holds invalid JSON.
    #[error("token file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors from the REST collaborators.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request never produced a response.
    #[error("http transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success status or `success: false`.
    #[error("server returned {status}: {}", message.as_deref().unwrap_or("no message"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server's `message` field, if any.
        message: Option<String>,
    },

    /// Response body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Successful response without the `data` the endpoint promises.
    #[error("response has no data")]
    MissingData,

    /// Credentials are missing or could not be refreshed. Stored tokens have
    /// been cleared.
    #[error("not authenticated")]
    Unauthorized,

    /// Credential store failed.
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// Local file could not be read for upload.
    #[error("cannot read upload: {0}")]
    File(String),
}
