//! Frontend-agnostic user input.
//!
//! Frontends turn whatever they read (a terminal line, a button press) into a
//! [`UserInput`]. Line-oriented frontends can use [`UserInput::parse`].

use std::{path::PathBuf, str::FromStr};

use roomline_proto::RoomId;

/// A user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Send text to the open room.
    Text(String),
    /// Upload a file and send it to the open room.
    File(PathBuf),
    /// Load older history in the open room.
    More,
    /// Open a room.
    Open(RoomId),
    /// Return to the room list.
    Back,
    /// Reload the room list.
    Refresh,
    /// Quit.
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Blank line.
    #[error("empty input")]
    Empty,
    /// `/something` that is not a known command.
    #[error("unknown command: /{0}")]
    UnknownCommand(String),
    /// A command is missing its argument or it is malformed.
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl UserInput {
    /// Parse one input line.
    ///
    /// Lines starting with `/` are commands: `/file <path>`, `/more`,
    /// `/open <room-id>`, `/back`, `/refresh`, `/quit`. A leading `//` sends
    /// a literal slash. Everything else is message text.
    pub fn parse(line: &str) -> Result<Self, InputError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(InputError::Empty);
        }

        if let Some(escaped) = line.strip_prefix("//") {
            return Ok(Self::Text(format!("/{escaped}")));
        }

        let Some(command) = line.strip_prefix('/') else {
            return Ok(Self::Text(line.to_string()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "file" if arg.is_empty() => Err(InputError::Usage("/file <path>")),
            "file" => Ok(Self::File(PathBuf::from(arg))),
            "more" => Ok(Self::More),
            "open" => arg.parse().map(Self::Open).map_err(|_| InputError::Usage("/open <room-id>")),
            "back" => Ok(Self::Back),
            "refresh" => Ok(Self::Refresh),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(InputError::UnknownCommand(other.to_string())),
        }
    }
}

impl FromStr for UserInput {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
