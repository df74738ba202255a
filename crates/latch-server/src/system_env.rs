//! Production Environment implementation using system time and RNG.

use std::time::{Duration, Instant};

use latch_core::Environment;

/// Production environment: wall-clock `Instant`, tokio timers and OS entropy.
///
/// # Security
///
/// `random_bytes` draws from `getrandom`. The device signing key is
/// generated from it on first start.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(e) = getrandom::fill(buffer) {
            // NOTE: SigningIdentity::generate refuses an all-zero seed.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        }
    }
}
