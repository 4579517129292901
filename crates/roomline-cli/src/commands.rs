//! Subcommand execution.
//!
//! Account, friend and room management commands are single REST calls whose
//! result is printed. `rooms` and `open` start a live session driven by the
//! [`Runtime`] over the [`CliDriver`].

use std::{io::Write, sync::Arc};

use roomline_app::Runtime;
use roomline_client::{
    CredentialStore, FileCredentialStore, SessionConfig, SystemEnv,
    api::{AuthApi, ChatApi, FriendApi, HttpApi},
};
use roomline_proto::{
    RoomId,
    payloads::{CreateRoomRequest, LoginRequest, SignUpRequest},
};
use tokio::io::BufReader;

use crate::{
    CliDriver,
    args::{Cli, Command, FriendsCommand},
    error::CliError,
    render::{friend_line, request_line, room_line, user_line},
};

/// Run the parsed command line.
///
/// # Errors
///
/// Returns the first REST, token file or session failure.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(cli.token_file.clone()));
    let api = Arc::new(HttpApi::new(cli.api_url.clone(), Arc::clone(&credentials)));

    match cli.command {
        Command::Rooms => chat(&cli.ws_url, api, credentials, None).await,
        Command::Open { room_id } => chat(&cli.ws_url, api, credentials, Some(room_id)).await,
        command => {
            let mut out = std::io::stdout();
            execute(command, api.as_ref(), credentials.as_ref(), &mut out).await
        },
    }
}

/// Live session on stdin and stdout until `/quit` or end of input.
async fn chat(
    ws_url: &str,
    api: Arc<HttpApi>,
    credentials: Arc<dyn CredentialStore>,
    open: Option<RoomId>,
) -> Result<(), CliError> {
    if credentials.tokens()?.is_none() {
        return Err(CliError::NotLoggedIn);
    }
    let me = api.me().await?;
    tracing::info!(user_id = me.id, %ws_url, "starting session");

    let input = BufReader::new(tokio::io::stdin());
    let driver = CliDriver::new(ws_url, api, input, std::io::stdout());
    let mut runtime =
        Runtime::new(driver, SystemEnv::new(), me.id, credentials, SessionConfig::default());

    runtime.run(open).await?;
    Ok(())
}

/// Run a one-shot command and print its result to `out`.
///
/// `rooms` and `open` print the room list once instead of starting a
/// session.
///
/// # Errors
///
/// Returns the REST or token file failure, or [`CliError::NotLoggedIn`] when a
/// command needs tokens and none are stored.
pub async fn execute<A, W>(
    command: Command,
    api: &A,
    credentials: &dyn CredentialStore,
    out: &mut W,
) -> Result<(), CliError>
where
    A: AuthApi + ChatApi + FriendApi,
    W: Write,
{
    match command {
        Command::Login { email, password } => {
            api.login(&LoginRequest { email, password }).await?;
            let me = api.me().await?;
            writeln!(out, "Logged in as {}", user_line(&me))?;
        },
        Command::Signup { email, password, nickname } => {
            let response = api.sign_up(&SignUpRequest { email, password, nickname }).await?;
            let code = response.user.friend_code.as_deref().unwrap_or("-");
            writeln!(out, "Welcome, {}! Your friend code is {code}", response.user.nickname)?;
        },
        Command::Logout => {
            credentials.clear()?;
            writeln!(out, "Logged out")?;
        },
        Command::Whoami => {
            require_login(credentials)?;
            writeln!(out, "{}", user_line(&api.me().await?))?;
        },
        Command::Rooms | Command::Open { .. } => {
            require_login(credentials)?;
            let rooms = api.list_rooms().await?;
            if rooms.is_empty() {
                writeln!(out, "No rooms")?;
            }
            for room in &rooms {
                writeln!(out, "{}", room_line(room))?;
            }
        },
        Command::Friends(command) => {
            require_login(credentials)?;
            friends(command, api, out).await?;
        },
        Command::CreateRoom { name, user_ids } => {
            require_login(credentials)?;
            let room = api.create_room(&CreateRoomRequest { name, user_ids }).await?;
            let members = room.users.len();
            writeln!(out, "Created room #{} {} with {members} members", room.id, room.name)?;
        },
        Command::LeaveRoom { room_id } => {
            require_login(credentials)?;
            api.leave_room(room_id).await?;
            writeln!(out, "Left room #{room_id}")?;
        },
    }

    Ok(())
}

async fn friends<A, W>(command: FriendsCommand, api: &A, out: &mut W) -> Result<(), CliError>
where
    A: FriendApi,
    W: Write,
{
    match command {
        FriendsCommand::List => {
            let friends = api.friends().await?;
            if friends.is_empty() {
                writeln!(out, "No friends yet")?;
            }
            for friend in &friends {
                writeln!(out, "{}", friend_line(friend))?;
            }
        },
        FriendsCommand::Requests | FriendsCommand::Sent => {
            let requests = if command == FriendsCommand::Requests {
                api.received_requests().await?
            } else {
                api.sent_requests().await?
            };
            if requests.is_empty() {
                writeln!(out, "No requests")?;
            }
            for request in &requests {
                writeln!(out, "{}", request_line(request))?;
            }
        },
        FriendsCommand::Add { code } => {
            let user = api.search_by_code(&code).await?;
            let request = api.send_request(&code).await?;
            writeln!(out, "Friend request #{} sent to {}", request.id, user.nickname)?;
        },
        FriendsCommand::Accept { request_id } => {
            api.accept_request(request_id).await?;
            writeln!(out, "Accepted request #{request_id}")?;
        },
        FriendsCommand::Reject { request_id } => {
            api.reject_request(request_id).await?;
            writeln!(out, "Rejected request #{request_id}")?;
        },
        FriendsCommand::Remove { friend_id } => {
            api.remove_friend(friend_id).await?;
            writeln!(out, "Removed friend {friend_id}")?;
        },
    }

    Ok(())
}

fn require_login(credentials: &dyn CredentialStore) -> Result<(), CliError> {
    match credentials.tokens()? {
        Some(_) => Ok(()),
        None => Err(CliError::NotLoggedIn),
    }
}
