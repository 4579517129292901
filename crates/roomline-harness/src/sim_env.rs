//! Simulated environment on tokio's clock.
//!
//! Tests run on a current-thread runtime with the clock paused
//! (`#[tokio::test(start_paused = true)]`). Tokio then advances time only when
//! every task is idle, so a 5 second reconnect back-off completes instantly
//! and always in the same order. Under turmoil the same clock is the
//! simulation's clock.

use std::{future::Future, time::Duration};

use roomline_core::Environment;

/// Environment backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimEnv;

impl SimEnv {
    /// Create a simulated environment.
    pub fn new() -> Self {
        Self
    }

    /// Move the paused clock forward.
    ///
    /// Only valid inside a runtime whose clock is paused.
    pub async fn advance(&self, duration: Duration) {
        tokio::time::advance(duration).await;
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
