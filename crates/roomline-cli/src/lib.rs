//! Command line client for Roomline
//!
//! A thin shell over [`roomline_app::Driver`] that reads commands and message
//! text line by line. All orchestration logic lives in the generic
//! [`roomline_app::Runtime`].
//!
//! This crate only handles argument parsing, line rendering and wiring the
//! REST and WebSocket collaborators together.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod args;
pub mod commands;
pub mod driver;
pub mod error;
pub mod render;

pub use args::{Cli, Command, FriendsCommand};
pub use driver::CliDriver;
pub use error::{CliError, DriverError};
pub use render::Renderer;
pub use roomline_app::{App, Driver, Runtime};
