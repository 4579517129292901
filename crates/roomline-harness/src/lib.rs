//! Deterministic simulation harness for the Roomline client.
//!
//! Drives the real [`roomline_app::Runtime`] against an in-memory STOMP
//! broker on tokio's paused clock. Reconnect back-offs, heart-beats and
//! timeouts complete instantly and always in the same order, so a failing
//! seed replays exactly.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! App/Client invariants and [`scenario::run_checked`] to check them after
//! every runtime cycle.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_api;
pub mod sim_broker;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    ClientSnapshot, Invariant, InvariantRegistry, InvariantResult, OnlyOpenRoomTopics,
    OpenRoomAgreement, RoomListUnique, SubscriptionsFollowConnection, SystemSnapshot,
    TimelineAscending, UniqueSubscriptions, Violation,
};
pub use scenario::{Scenario, ScenarioError, ScriptStep, SimRuntime, play, resume, run_checked};
pub use sim_api::SimApi;
pub use sim_broker::{
    ConnectionId, SharedSimBroker, SimBroker, create_shared_broker, lock_broker,
};
pub use sim_driver::{RenderRecord, SimDriver, SimDriverError};
pub use sim_env::SimEnv;
