//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples device logic from system resources
//! (time, randomness). Production uses the system clock and OS entropy;
//! tests substitute seeded implementations.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleeping.
///
/// The lock handler bounds every actuator call by racing it against
/// [`Environment::sleep`], so a simulated environment also controls when
/// actuator timeouts fire.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Security
    ///
    /// Production implementations MUST use OS entropy (`getrandom`). The
    /// device signing key is derived from these bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Draws eight bytes through `random_bytes`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
