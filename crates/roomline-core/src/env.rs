//! Environment abstraction for deterministic testing.
//!
//! State machines never read the clock themselves. Drivers obtain time from an
//! [`Environment`] and pass it in, so the same code runs against the system
//! clock in production and a virtual clock in simulation.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards within one execution context
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type of this environment.
    ///
    /// Production uses `std::time::Instant`; simulations use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this. State machines take `now` as a parameter.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
