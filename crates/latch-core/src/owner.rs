//! Owner registry.
//!
//! Once claimed, the device authorizes a single [`BlessingPattern`]. The
//! pattern lives in memory inside the claim state machine; the registry makes
//! it durable through an [`OwnerStore`] and restores it before the device
//! serves its first call.

use std::sync::Mutex;

use crate::credential::BlessingPattern;

/// Errors from an owner store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("owner store I/O error: {0}")]
    Io(String),

    /// Persisted record could not be decoded.
    #[error("owner record corrupt: {0}")]
    Corrupt(String),

    /// A store-internal lock was poisoned.
    #[error("owner store lock poisoned")]
    Poisoned,
}

/// Durable home of the owner pattern.
///
/// # Invariants
///
/// - After `store(p)` returns `Ok`, every later `load()` (including after a
///   process restart, for durable implementations) returns `Some(p)` until
///   `clear()` is called.
pub trait OwnerStore: Send + Sync {
    /// Load the persisted owner pattern, if any.
    fn load(&self) -> Result<Option<BlessingPattern>, StoreError>;

    /// Persist the owner pattern.
    fn store(&self, pattern: &BlessingPattern) -> Result<(), StoreError>;

    /// Forget the owner (factory reset tooling only; the device never calls
    /// this).
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory owner store.
#[derive(Debug, Default)]
pub struct MemoryOwnerStore {
    pattern: Mutex<Option<BlessingPattern>>,
}

impl MemoryOwnerStore {
    /// Empty store: the device starts unclaimed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `pattern`: the device starts claimed.
    pub fn with_owner(pattern: BlessingPattern) -> Self {
        Self { pattern: Mutex::new(Some(pattern)) }
    }
}

impl OwnerStore for MemoryOwnerStore {
    fn load(&self) -> Result<Option<BlessingPattern>, StoreError> {
        self.pattern.lock().map(|p| p.clone()).map_err(|_| StoreError::Poisoned)
    }

    fn store(&self, pattern: &BlessingPattern) -> Result<(), StoreError> {
        let mut slot = self.pattern.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = Some(pattern.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut slot = self.pattern.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = None;
        Ok(())
    }
}

impl<S: OwnerStore + ?Sized> OwnerStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<BlessingPattern>, StoreError> {
        (**self).load()
    }

    fn store(&self, pattern: &BlessingPattern) -> Result<(), StoreError> {
        (**self).store(pattern)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// Write-once front for an [`OwnerStore`].
pub struct OwnerRegistry {
    store: Box<dyn OwnerStore>,
}

impl OwnerRegistry {
    /// Registry persisting through `store`.
    pub fn new(store: Box<dyn OwnerStore>) -> Self {
        Self { store }
    }

    /// Read the owner recorded by a previous process, if any.
    pub fn restore(&self) -> Result<Option<BlessingPattern>, StoreError> {
        let restored = self.store.load()?;
        match &restored {
            Some(pattern) => tracing::info!("restored owner pattern {}", pattern),
            None => tracing::debug!("no persisted owner, device is unclaimed"),
        }
        Ok(restored)
    }

    /// Durably record the owner.
    ///
    /// Called by the claim state machine before it publishes the claimed
    /// state, so a crash after this returns never forgets the owner.
    pub fn record(&self, pattern: &BlessingPattern) -> Result<(), StoreError> {
        self.store.store(pattern).inspect_err(|e| {
            tracing::error!("failed to persist owner pattern {}: {}", pattern, e);
        })
    }
}

impl std::fmt::Debug for OwnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerRegistry").finish_non_exhaustive()
    }
}
