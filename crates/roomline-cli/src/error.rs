//! CLI error types.

use std::io;

use roomline_app::RuntimeError;
use roomline_client::{ApiError, CredentialError};
use thiserror::Error;

/// Driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No transport is open.
    #[error("not connected")]
    NotConnected,

    /// The transport task is gone.
    #[error("transport channel closed")]
    ChannelSend,
}

/// Errors surfaced to `main`.
#[derive(Debug, Error)]
pub enum CliError {
    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A REST call failed.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// The token file could not be used.
    #[error("{0}")]
    Credentials(#[from] CredentialError),

    /// The live session failed.
    #[error("session failed: {0}")]
    Session(#[from] RuntimeError<DriverError>),

    /// The command needs a stored login.
    #[error("not logged in; run `roomline login` first")]
    NotLoggedIn,
}
