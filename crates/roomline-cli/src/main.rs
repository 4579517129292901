//! Roomline command line client.
//!
//! # Usage
//!
//! ```bash
//! # Log in once; tokens are kept in the token file
//! roomline login --email ana@example.com --password secret
//!
//! # Watch the room list, then `/open <id>` to chat
//! roomline rooms
//!
//! # Jump straight into a room
//! roomline --ws-url wss://chat.example.com/ws open 42
//! ```

use clap::Parser;
use roomline_cli::{Cli, commands};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Logs go to stderr so they never interleave with the chat on stdout
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = commands::run(cli).await {
        tracing::error!(error = %e, "roomline failed");
        return Err(e.into());
    }

    Ok(())
}
