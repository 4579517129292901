//! Application layer for Roomline
//!
//! Pure state machines and a generic runtime for chat navigation and session
//! orchestration. Simulation tests drive the same code the CLI runs.
//!
//! # Components
//!
//! - [`App`]: view state machine (room list, open room, status line)
//! - [`Bridge`]: protocol bridge (translates App actions to Client events)
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: generic orchestration loop using a Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod driver;
mod event;
mod input;
mod runtime;
mod state;

pub use action::AppAction;
pub use app::App;
pub use bridge::{Bridge, IoRequest};
pub use driver::{Driver, DriverInput};
pub use event::AppEvent;
pub use input::{InputError, UserInput};
pub use runtime::{Runtime, RuntimeError, TICK_INTERVAL};
pub use state::{ConnectionState, RoomView, Screen, message_line};
