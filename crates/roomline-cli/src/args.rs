//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use roomline_proto::{RoomId, UserId};

/// Roomline chat client
#[derive(Parser, Debug)]
#[command(name = "roomline")]
#[command(about = "Command line client for Roomline chat")]
#[command(version)]
pub struct Cli {
    /// WebSocket endpoint of the STOMP broker
    #[arg(long, env = "ROOMLINE_WS_URL", default_value = "ws://localhost:8080/ws")]
    pub ws_url: String,

    /// Base URL of the REST API
    #[arg(long, env = "ROOMLINE_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// File holding the access and refresh tokens
    #[arg(long, env = "ROOMLINE_TOKEN_FILE", default_value = ".roomline-tokens.json")]
    pub token_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in and store the issued tokens
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
    },

    /// Create an account and log in
    Signup {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
        /// Display name
        #[arg(long)]
        nickname: String,
    },

    /// Forget the stored tokens
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Watch the room list live
    Rooms,

    /// Open a room and chat
    Open {
        /// Room to open
        room_id: RoomId,
    },

    /// Friends and friend requests
    #[command(subcommand)]
    Friends(FriendsCommand),

    /// Create a room with the given members
    CreateRoom {
        /// Room name
        name: String,
        /// Members to invite
        #[arg(required = true)]
        user_ids: Vec<UserId>,
    },

    /// Leave a room
    LeaveRoom {
        /// Room to leave
        room_id: RoomId,
    },
}

/// `friends` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum FriendsCommand {
    /// List friends
    List,
    /// Requests addressed to you
    Requests,
    /// Requests you sent
    Sent,
    /// Send a friend request
    Add {
        /// The other user's friend code
        code: String,
    },
    /// Accept a request
    Accept {
        /// Request id
        request_id: u64,
    },
    /// Reject a request
    Reject {
        /// Request id
        request_id: u64,
    },
    /// End a friendship
    Remove {
        /// Friend's user id
        friend_id: UserId,
    },
}
