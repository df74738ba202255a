//! Fault-injecting actuator.
//!
//! Wraps a [`MemoryActuator`] and, driven by a seeded RNG, makes moves fail
//! outright or stall forever. A stalled move may or may not have reached the
//! target before it stopped answering, like a motor that loses its limit
//! switch signal mid-travel.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use latch_core::{Actuator, ActuatorError, MemoryActuator};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fault rates for a [`ChaoticActuator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaosConfig {
    /// Probability that a move reports a fault without moving.
    pub fault_rate: f64,
    /// Probability that a move never completes.
    pub hang_rate: f64,
    /// Probability that a position read reports a fault.
    pub read_fault_rate: f64,
    /// Travel time of a successful move.
    pub latency: Duration,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self { fault_rate: 0.1, hang_rate: 0.05, read_fault_rate: 0.0, latency: Duration::ZERO }
    }
}

enum MoveOutcome {
    Fault,
    Hang { moved: bool },
    Move,
}

/// Actuator that injects faults and stalls.
pub struct ChaoticActuator {
    inner: MemoryActuator,
    config: ChaosConfig,
    rng: Mutex<ChaCha8Rng>,
    faults: AtomicU64,
    hangs: AtomicU64,
}

impl ChaoticActuator {
    /// Unlocked actuator seeded with `seed`.
    pub fn new(seed: u64, config: ChaosConfig) -> Self {
        Self {
            inner: MemoryActuator::with_state(false, config.latency),
            config,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            faults: AtomicU64::new(0),
            hangs: AtomicU64::new(0),
        }
    }

    /// Shared handle, for tests that inspect the actuator after handing it
    /// to a device.
    pub fn shared(seed: u64, config: ChaosConfig) -> Arc<Self> {
        Arc::new(Self::new(seed, config))
    }

    /// Physical bolt position.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Injected faults so far.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::SeqCst)
    }

    /// Injected stalls so far.
    pub fn hangs(&self) -> u64 {
        self.hangs.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping moves observed.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight()
    }

    fn draw_move(&self) -> MoveOutcome {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.gen_bool(self.config.fault_rate) {
            MoveOutcome::Fault
        } else if rng.gen_bool(self.config.hang_rate) {
            MoveOutcome::Hang { moved: rng.gen_bool(0.5) }
        } else {
            MoveOutcome::Move
        }
    }

    fn draw_read_fault(&self) -> bool {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(self.config.read_fault_rate)
    }
}

#[async_trait]
impl Actuator for ChaoticActuator {
    async fn set_locked(&self, locked: bool) -> Result<(), ActuatorError> {
        match self.draw_move() {
            MoveOutcome::Fault => {
                self.faults.fetch_add(1, Ordering::SeqCst);
                Err(ActuatorError::Fault { reason: "injected fault".to_string() })
            },
            MoveOutcome::Hang { moved } => {
                self.hangs.fetch_add(1, Ordering::SeqCst);
                if moved {
                    self.inner.set_locked(locked).await?;
                }
                std::future::pending::<()>().await;
                Ok(())
            },
            MoveOutcome::Move => self.inner.set_locked(locked).await,
        }
    }

    async fn get_locked(&self) -> Result<bool, ActuatorError> {
        if self.draw_read_fault() {
            self.faults.fetch_add(1, Ordering::SeqCst);
            return Err(ActuatorError::Fault { reason: "injected read fault".to_string() });
        }
        self.inner.get_locked().await
    }
}

impl std::fmt::Debug for ChaoticActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaoticActuator")
            .field("config", &self.config)
            .field("locked", &self.is_locked())
            .field("faults", &self.faults())
            .field("hangs", &self.hangs())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn certain_fault_never_moves() {
        let actuator =
            ChaoticActuator::new(1, ChaosConfig { fault_rate: 1.0, ..ChaosConfig::default() });

        let result = actuator.set_locked(true).await;
        assert!(matches!(result, Err(ActuatorError::Fault { .. })));
        assert!(!actuator.is_locked());
        assert_eq!(actuator.faults(), 1);
    }

    #[tokio::test]
    async fn no_chaos_behaves_like_memory_actuator() {
        let config = ChaosConfig { fault_rate: 0.0, hang_rate: 0.0, ..ChaosConfig::default() };
        let actuator = ChaoticActuator::new(1, config);

        for _ in 0..50 {
            actuator.set_locked(true).await.unwrap();
            actuator.set_locked(false).await.unwrap();
        }
        assert!(!actuator.get_locked().await.unwrap());
        assert_eq!(actuator.faults() + actuator.hangs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn certain_hang_never_returns() {
        let config = ChaosConfig { fault_rate: 0.0, hang_rate: 1.0, ..ChaosConfig::default() };
        let actuator = ChaoticActuator::new(1, config);

        let result =
            tokio::time::timeout(Duration::from_secs(60), actuator.set_locked(true)).await;
        assert!(result.is_err());
        assert_eq!(actuator.hangs(), 1);
    }
}
