//! Claim state machine.
//!
//! A device starts `Unclaimed` and moves to `Claimed` exactly once. The
//! transition is a test-and-set under the state write lock: identity
//! extension and owner persistence happen while the lock is held, and the
//! new state is published only after both succeed. Racing claimants queue on
//! the lock; the first to acquire it wins and every later one sees
//! `Claimed`.
//!
//! ```text
//!            Claim(name) ok
//! Unclaimed ───────────────▶ Claimed(owner)
//!     │                          │
//!     └─ Claim(bad name) ─┐      └─ Claim(_) ─▶ AlreadyClaimed
//!        identity/store   │
//!        failure ◀────────┘ (stays Unclaimed)
//! ```

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::{
    credential::{BlessingName, BlessingPattern, IssuedCredential},
    error::DeviceError,
    identity::DeviceIdentity,
    owner::OwnerRegistry,
};

/// Ownership state of a device.
///
/// The owner pattern is carried by the `Claimed` variant, so it exists iff
/// the device is claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// No owner yet; only `Claim` is exposed.
    Unclaimed,
    /// Owned; only `Lock`, `Unlock` and `Status` are exposed.
    Claimed {
        /// Pattern every caller must satisfy.
        owner: BlessingPattern,
    },
}

impl DeviceState {
    /// Mode tag of this state.
    pub fn mode(&self) -> DeviceMode {
        match self {
            Self::Unclaimed => DeviceMode::Unclaimed,
            Self::Claimed { .. } => DeviceMode::Claimed,
        }
    }
}

/// Mode tag consulted by the dispatch gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMode {
    /// Unclaimed interface.
    Unclaimed,
    /// Claimed (lock) interface.
    Claimed,
}

impl DeviceMode {
    /// Methods served in this mode.
    pub fn exposed(self) -> &'static [&'static str] {
        match self {
            Self::Unclaimed => &["Claim"],
            Self::Claimed => &["Lock", "Unlock", "Status"],
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclaimed => f.write_str("unclaimed"),
            Self::Claimed => f.write_str("claimed"),
        }
    }
}

/// Owner of [`DeviceState`] and the only code path that mutates it.
pub struct ClaimStateMachine {
    state: RwLock<DeviceState>,
    identity: Arc<dyn DeviceIdentity>,
    registry: OwnerRegistry,
}

impl ClaimStateMachine {
    /// Build the state machine, restoring a persisted owner first.
    ///
    /// A device whose store holds a pattern starts `Claimed`, so it never
    /// serves a call in the unclaimed mode after a restart.
    pub fn new(
        identity: Arc<dyn DeviceIdentity>,
        registry: OwnerRegistry,
    ) -> Result<Self, DeviceError> {
        let state = match registry.restore()? {
            Some(owner) => DeviceState::Claimed { owner },
            None => DeviceState::Unclaimed,
        };

        Ok(Self { state: RwLock::new(state), identity, registry })
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> Result<DeviceState, DeviceError> {
        self.state.read().map(|s| s.clone()).map_err(|_| DeviceError::poisoned("device state"))
    }

    /// Current mode.
    pub fn mode(&self) -> Result<DeviceMode, DeviceError> {
        self.state.read().map(|s| s.mode()).map_err(|_| DeviceError::poisoned("device state"))
    }

    /// Owner pattern, if claimed.
    pub fn owner(&self) -> Result<Option<BlessingPattern>, DeviceError> {
        Ok(match self.snapshot()? {
            DeviceState::Claimed { owner } => Some(owner),
            DeviceState::Unclaimed => None,
        })
    }

    /// Claim the device for `name`.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if `name` is not a single blessing component
    /// - `AlreadyClaimed` if the device is claimed, including when another
    ///   claimant won a concurrent race
    /// - `Identity` / `Storage` if the credential could not be minted or
    ///   persisted; the device stays unclaimed
    pub fn claim(&self, name: &str) -> Result<IssuedCredential, DeviceError> {
        let extension = BlessingName::component(name)?;

        let mut state = self.state.write().map_err(|_| DeviceError::poisoned("device state"))?;

        if let DeviceState::Claimed { owner } = &*state {
            tracing::debug!("claim by {} rejected, already owned by {}", extension, owner);
            return Err(DeviceError::AlreadyClaimed);
        }

        let issued = self.identity.extend_with(&extension)?;
        self.registry.record(&issued.pattern)?;

        *state = DeviceState::Claimed { owner: issued.pattern.clone() };
        drop(state);

        tracing::info!("device claimed, owner pattern {}", issued.pattern);
        Ok(issued)
    }
}

impl fmt::Debug for ClaimStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimStateMachine")
            .field("state", &self.state)
            .field("identity", &self.identity.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credential::NameError,
        identity::{IdentityError, NamedIdentity},
        owner::{MemoryOwnerStore, OwnerStore, StoreError},
    };

    struct FailingStore;

    impl OwnerStore for FailingStore {
        fn load(&self) -> Result<Option<BlessingPattern>, StoreError> {
            Ok(None)
        }

        fn store(&self, _pattern: &BlessingPattern) -> Result<(), StoreError> {
            Err(StoreError::Io("disk full".to_string()))
        }

        fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn machine_with(store: Box<dyn OwnerStore>) -> ClaimStateMachine {
        let identity = Arc::new(NamedIdentity::new(BlessingName::parse("device").unwrap()));
        ClaimStateMachine::new(identity, OwnerRegistry::new(store)).unwrap()
    }

    fn fresh() -> ClaimStateMachine {
        machine_with(Box::new(MemoryOwnerStore::new()))
    }

    #[test]
    fn starts_unclaimed() {
        let machine = fresh();
        assert_eq!(machine.snapshot().unwrap(), DeviceState::Unclaimed);
        assert_eq!(machine.owner().unwrap(), None);
    }

    #[test]
    fn claim_issues_extended_credential() {
        let machine = fresh();
        let issued = machine.claim("alice").unwrap();

        assert_eq!(issued.blessing.as_str(), "device/alice");
        assert_eq!(machine.mode().unwrap(), DeviceMode::Claimed);
        assert_eq!(machine.owner().unwrap(), Some(issued.pattern));
    }

    #[test]
    fn second_claim_is_rejected_without_mutation() {
        let machine = fresh();
        machine.claim("alice").unwrap();

        let result = machine.claim("bob");
        assert!(matches!(result, Err(DeviceError::AlreadyClaimed)));
        assert_eq!(machine.owner().unwrap().unwrap().to_string(), "device/alice");
    }

    #[test]
    fn invalid_name_leaves_device_unclaimed() {
        let machine = fresh();

        for bad in ["", "alice/phone", "a$b", "with space"] {
            let result = machine.claim(bad);
            assert!(matches!(result, Err(DeviceError::InvalidName(_))), "{bad:?} accepted");
        }
        assert!(matches!(
            machine.claim("x/y"),
            Err(DeviceError::InvalidName(NameError::NotAComponent { components: 2 }))
        ));
        assert_eq!(machine.mode().unwrap(), DeviceMode::Unclaimed);
    }

    #[test]
    fn storage_failure_leaves_device_unclaimed() {
        let machine = machine_with(Box::new(FailingStore));

        let result = machine.claim("alice");
        assert!(matches!(result, Err(DeviceError::Storage(_))));
        assert_eq!(machine.snapshot().unwrap(), DeviceState::Unclaimed);
    }

    #[test]
    fn signing_failure_leaves_device_unclaimed() {
        struct OfflineSigner(BlessingName);

        impl DeviceIdentity for OfflineSigner {
            fn name(&self) -> &BlessingName {
                &self.0
            }

            fn extend_with(&self, _: &BlessingName) -> Result<IssuedCredential, IdentityError> {
                Err(IdentityError::Signing { reason: "secure element offline".to_string() })
            }
        }

        let identity = Arc::new(OfflineSigner(BlessingName::parse("device").unwrap()));
        let machine =
            ClaimStateMachine::new(identity, OwnerRegistry::new(Box::new(MemoryOwnerStore::new())))
                .unwrap();

        let result = machine.claim("alice");
        assert!(matches!(result, Err(DeviceError::Identity(IdentityError::Signing { .. }))));
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(machine.mode().unwrap(), DeviceMode::Unclaimed);
    }

    #[test]
    fn restores_claimed_state_from_store() {
        let pattern = BlessingPattern::parse("device/alice").unwrap();
        let machine = machine_with(Box::new(MemoryOwnerStore::with_owner(pattern.clone())));

        assert_eq!(machine.snapshot().unwrap(), DeviceState::Claimed { owner: pattern });
        assert!(matches!(machine.claim("bob"), Err(DeviceError::AlreadyClaimed)));
    }

    #[test]
    fn claim_persists_owner() {
        let store = Arc::new(MemoryOwnerStore::new());
        let machine = machine_with(Box::new(Arc::clone(&store)));

        machine.claim("alice").unwrap();
        assert_eq!(store.load().unwrap().unwrap().to_string(), "device/alice");
    }

    #[test]
    fn exposed_methods_per_mode() {
        assert_eq!(DeviceMode::Unclaimed.exposed(), &["Claim"]);
        assert_eq!(DeviceMode::Claimed.exposed(), &["Lock", "Unlock", "Status"]);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let machine = Arc::new(fresh());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let machine = Arc::clone(&machine);
                std::thread::spawn(move || machine.claim(&format!("user{i}")))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

        assert_eq!(winners.len(), 1);
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(DeviceError::AlreadyClaimed)))
        );
        assert_eq!(machine.owner().unwrap(), Some(winners[0].pattern.clone()));
    }
}
