//! Client
//!
//! Action-based chat client for the Roomline broker. Keeps one STOMP session,
//! the live room-list updates and the timeline of the open room consistent
//! across navigation and reconnects.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`roomline_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine
//! - [`CredentialStore`]: Token pair read before every handshake
//! - [`api`]: REST collaborator traits (rooms, friends, auth, uploads)
//!
//! # Optional features
//!
//! - `http`: [`api::HttpApi`], the `reqwest` implementation of the REST traits
//! - `transport`: [`transport::connect`] over WebSocket and [`SystemEnv`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
mod client;
mod credentials;
mod error;
mod event;

#[cfg(feature = "transport")]
mod system_env;
#[cfg(feature = "transport")]
pub mod transport;

pub use client::Client;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ApiError, ClientError, CredentialError};
pub use event::{ClientAction, ClientEvent, TransportEvent};
pub use roomline_core::{Environment, SessionConfig, SessionState};
#[cfg(feature = "transport")]
pub use system_env::SystemEnv;
