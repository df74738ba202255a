//! Actuator interface.
//!
//! The physical driver behind the bolt. Implementations do not need to
//! serialize calls or enforce timeouts themselves; the
//! [`LockHandler`](crate::LockHandler) does both.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

/// Errors reported by an actuator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorError {
    /// Hardware-reported fault (jam, power loss, sensor disagreement).
    #[error("actuator fault: {reason}")]
    Fault {
        /// Driver-supplied description.
        reason: String,
    },

    /// No answer within the bound.
    #[error("actuator timed out after {after:?}")]
    Timeout {
        /// Bound that was exceeded.
        after: Duration,
    },
}

/// Physical lock primitive.
#[async_trait]
pub trait Actuator: Send + Sync + 'static {
    /// Drive the bolt to `locked`. Must be idempotent.
    async fn set_locked(&self, locked: bool) -> Result<(), ActuatorError>;

    /// Read the bolt position.
    async fn get_locked(&self) -> Result<bool, ActuatorError>;
}

#[async_trait]
impl<A: Actuator + ?Sized> Actuator for Arc<A> {
    async fn set_locked(&self, locked: bool) -> Result<(), ActuatorError> {
        (**self).set_locked(locked).await
    }

    async fn get_locked(&self) -> Result<bool, ActuatorError> {
        (**self).get_locked().await
    }
}

/// In-memory actuator.
///
/// Stands in for hardware on development hosts and in tests. Tracks how
/// many `set_locked` calls overlap so tests can assert actuation is
/// serialized.
#[derive(Debug, Default)]
pub struct MemoryActuator {
    locked: AtomicBool,
    latency: Duration,
    actuations: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryActuator {
    /// Unlocked actuator answering immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Actuator starting in the given position, taking `latency` per move.
    pub fn with_state(locked: bool, latency: Duration) -> Self {
        Self { locked: AtomicBool::new(locked), latency, ..Self::default() }
    }

    /// Current position without going through the async interface.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Number of completed `set_locked` calls.
    pub fn actuations(&self) -> u64 {
        self.actuations.load(Ordering::SeqCst)
    }

    /// Highest number of `set_locked` calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Actuator for MemoryActuator {
    async fn set_locked(&self, locked: bool) -> Result<(), ActuatorError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.locked.store(locked, Ordering::SeqCst);

        self.actuations.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_locked(&self) -> Result<bool, ActuatorError> {
        Ok(self.locked.load(Ordering::SeqCst))
    }
}
