//! Lock operation handler.
//!
//! Serializes Lock/Unlock against the actuator and answers Status.
//!
//! ## Status cache
//!
//! The handler remembers the last position it knows to be true. While an
//! actuation runs the cache still holds the pre-actuation position; once it
//! completes the cache holds the new position. A failed or timed-out
//! actuation marks the cache unknown, and the next Status asks the actuator
//! directly.
//!
//! A direct read may race an actuation that starts after the read began.
//! Every actuation bumps a generation counter on entry and exit, and a
//! direct read only writes its answer back if the generation is unchanged,
//! so a slow read can never overwrite a newer position.

use std::{
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use latch_proto::LockStatus;
use tokio::sync::Mutex as AsyncMutex;

use crate::{
    actuator::{Actuator, ActuatorError},
    config::DeviceConfig,
    env::Environment,
    error::DeviceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cached {
    Known(LockStatus),
    Unknown,
}

#[derive(Debug)]
struct StatusCache {
    status: Cached,
    generation: u64,
}

/// Invalidates the cache if an actuation is dropped before it reports.
///
/// The bolt may have moved by the time the caller gave up, so neither the
/// pre nor the post position can be trusted.
struct InFlight<'a> {
    cache: &'a Mutex<StatusCache>,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.status = Cached::Unknown;
            cache.generation += 1;
            tracing::warn!("actuation abandoned before completion, status cache invalidated");
        }
    }
}

/// Serialized access to an [`Actuator`].
pub struct LockHandler<E, A>
where
    E: Environment,
    A: Actuator,
{
    env: E,
    actuator: A,
    config: DeviceConfig,
    /// Held for the full duration of one actuation.
    actuation: AsyncMutex<()>,
    cache: Mutex<StatusCache>,
}

impl<E, A> LockHandler<E, A>
where
    E: Environment,
    A: Actuator,
{
    /// Handler over `actuator`. The first Status reads the actuator.
    pub fn new(env: E, actuator: A, config: DeviceConfig) -> Self {
        Self {
            env,
            actuator,
            config,
            actuation: AsyncMutex::new(()),
            cache: Mutex::new(StatusCache { status: Cached::Unknown, generation: 0 }),
        }
    }

    /// The driven actuator.
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Drive the bolt to Locked. Idempotent.
    pub async fn lock(&self) -> Result<(), DeviceError> {
        self.actuate(LockStatus::Locked).await
    }

    /// Drive the bolt to Unlocked. Idempotent.
    pub async fn unlock(&self) -> Result<(), DeviceError> {
        self.actuate(LockStatus::Unlocked).await
    }

    /// Current bolt position.
    ///
    /// Served from the cache when it is known, otherwise read from the
    /// actuator within `status_timeout`. Never moves the bolt.
    pub async fn status(&self) -> Result<LockStatus, DeviceError> {
        let (cached, generation) = {
            let cache = self.cache()?;
            (cache.status, cache.generation)
        };

        if let Cached::Known(status) = cached {
            return Ok(status);
        }

        let locked = self
            .bounded(self.config.status_timeout, self.actuator.get_locked())
            .await
            .inspect_err(|e| tracing::error!("status read failed: {}", e))?;
        let status = LockStatus::from_locked(locked);

        let mut cache = self.cache()?;
        if cache.generation == generation {
            cache.status = Cached::Known(status);
        }
        Ok(status)
    }

    /// Whether Status would currently be served without touching the
    /// actuator.
    pub fn has_cached_status(&self) -> bool {
        self.cache().is_ok_and(|c| matches!(c.status, Cached::Known(_)))
    }

    async fn actuate(&self, target: LockStatus) -> Result<(), DeviceError> {
        let _serialized = self.actuation.lock().await;

        self.cache()?.generation += 1;
        let mut in_flight = InFlight { cache: &self.cache, armed: true };

        let started = self.env.now();
        let result =
            self.bounded(self.config.actuation_timeout, self.actuator.set_locked(target.is_locked())).await;
        let elapsed = self.env.now().saturating_duration_since(started);

        in_flight.armed = false;
        let mut cache = self.cache()?;
        cache.generation += 1;
        match result {
            Ok(()) => {
                cache.status = Cached::Known(target);
                tracing::debug!("actuated to {} in {:?}", target, elapsed);
                Ok(())
            },
            Err(e) => {
                cache.status = Cached::Unknown;
                tracing::error!("actuation to {} failed after {:?}: {}", target, elapsed, e);
                Err(e.into())
            },
        }
    }

    async fn bounded<T>(
        &self,
        limit: Duration,
        operation: impl Future<Output = Result<T, ActuatorError>>,
    ) -> Result<T, ActuatorError> {
        tokio::select! {
            biased;
            result = operation => result,
            () = self.env.sleep(limit) => Err(ActuatorError::Timeout { after: limit }),
        }
    }

    fn cache(&self) -> Result<MutexGuard<'_, StatusCache>, DeviceError> {
        self.cache.lock().map_err(|_| DeviceError::poisoned("status cache"))
    }
}

impl<E, A> std::fmt::Debug for LockHandler<E, A>
where
    E: Environment,
    A: Actuator,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandler")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
