//! Device aggregate and mode gate.
//!
//! A [`Device`] owns the claim state machine, the access controller and the
//! lock handler. Every call enters through [`Device::dispatch`], which routes
//! it by the current [`DeviceMode`]:
//!
//! | Mode        | Exposed                    | Anything else            |
//! |-------------|----------------------------|--------------------------|
//! | `Unclaimed` | `Claim`                    | `OperationUnavailable`   |
//! | `Claimed`   | `Lock`, `Unlock`, `Status` | `OperationUnavailable`   |
//!
//! `Describe` is answered in both modes and lists the exposed methods.
//!
//! The gate reads mode and owner pattern from one snapshot, so a call that
//! is routed to the claimed interface is authorized against the pattern that
//! made the device claimed.

use std::sync::Arc;

use latch_proto::{Call, LockStatus, Reply};

use crate::{
    access::{AccessController, Operation},
    actuator::Actuator,
    claim::{ClaimStateMachine, DeviceMode, DeviceState},
    config::DeviceConfig,
    credential::{BlessingPattern, CallerCredential, IssuedCredential},
    env::Environment,
    error::DeviceError,
    identity::DeviceIdentity,
    lock::LockHandler,
    owner::{MemoryOwnerStore, OwnerRegistry, OwnerStore},
    verifier::{CredentialVerifier, PatternVerifier},
};

/// A call as seen by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// Take ownership (unclaimed mode).
    Claim {
        /// Blessing component to extend the device identity with.
        name: String,
    },
    /// Engage the bolt (claimed mode).
    Lock,
    /// Release the bolt (claimed mode).
    Unlock,
    /// Read the bolt (claimed mode).
    Status,
    /// List exposed methods (any mode).
    Describe,
}

impl DeviceCall {
    /// Method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "Claim",
            Self::Lock => "Lock",
            Self::Unlock => "Unlock",
            Self::Status => "Status",
            Self::Describe => "Describe",
        }
    }
}

impl From<Call> for DeviceCall {
    fn from(call: Call) -> Self {
        match call {
            Call::Claim { name } => Self::Claim { name },
            Call::Lock => Self::Lock,
            Call::Unlock => Self::Unlock,
            Call::Status => Self::Status,
            Call::Describe => Self::Describe,
        }
    }
}

/// Successful outcome of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReply {
    /// Claim succeeded.
    Claimed(IssuedCredential),
    /// Lock or Unlock completed.
    Done,
    /// Bolt position.
    Status(LockStatus),
    /// Methods exposed in the current mode.
    Interface(&'static [&'static str]),
}

impl From<DeviceReply> for Reply {
    fn from(reply: DeviceReply) -> Self {
        match reply {
            DeviceReply::Claimed(issued) => Self::Claimed(issued.to_payload()),
            DeviceReply::Done => Self::Done,
            DeviceReply::Status(status) => Self::Status(status),
            DeviceReply::Interface(methods) => {
                Self::Interface(methods.iter().map(|m| (*m).to_string()).collect())
            },
        }
    }
}

/// A claimable lock device.
pub struct Device<E, A>
where
    E: Environment,
    A: Actuator,
{
    claim: ClaimStateMachine,
    access: AccessController,
    locks: LockHandler<E, A>,
}

impl<E, A> Device<E, A>
where
    E: Environment,
    A: Actuator,
{
    /// Start building a device.
    pub fn builder(env: E, actuator: A, identity: Arc<dyn DeviceIdentity>) -> DeviceBuilder<E, A> {
        DeviceBuilder {
            env,
            actuator,
            identity,
            verifier: Arc::new(PatternVerifier),
            store: Box::new(MemoryOwnerStore::new()),
            config: DeviceConfig::default(),
        }
    }

    /// Route `call` through the mode gate.
    ///
    /// # Errors
    ///
    /// - `OperationUnavailable` when `call` is not exposed in the sampled mode
    /// - `NotAuthorized` when a claimed-mode caller fails the owner check
    /// - anything the claim state machine or lock handler reports
    pub async fn dispatch(
        &self,
        caller: &CallerCredential,
        call: DeviceCall,
    ) -> Result<DeviceReply, DeviceError> {
        let state = self.claim.snapshot()?;
        let mode = state.mode();

        match (state, call) {
            (_, DeviceCall::Describe) => Ok(DeviceReply::Interface(mode.exposed())),

            (DeviceState::Unclaimed, DeviceCall::Claim { name }) => {
                self.claim.claim(&name).map(DeviceReply::Claimed)
            },

            (DeviceState::Claimed { owner }, DeviceCall::Lock) => {
                self.access.authorize(caller, &owner, Operation::Lock)?;
                self.locks.lock().await.map(|()| DeviceReply::Done)
            },

            (DeviceState::Claimed { owner }, DeviceCall::Unlock) => {
                self.access.authorize(caller, &owner, Operation::Unlock)?;
                self.locks.unlock().await.map(|()| DeviceReply::Done)
            },

            (DeviceState::Claimed { owner }, DeviceCall::Status) => {
                self.access.authorize(caller, &owner, Operation::Status)?;
                self.locks.status().await.map(DeviceReply::Status)
            },

            (_, call) => {
                tracing::debug!("{} rejected by mode gate while {}", call.method(), mode);
                Err(DeviceError::OperationUnavailable { operation: call.method(), mode })
            },
        }
    }

    /// Claim the device directly through the claim state machine.
    ///
    /// Unlike a dispatched `Claim`, this reports `AlreadyClaimed` rather than
    /// `OperationUnavailable` on a claimed device.
    pub fn claim(&self, name: &str) -> Result<IssuedCredential, DeviceError> {
        self.claim.claim(name)
    }

    /// Dispatch `Lock` for `caller`.
    pub async fn lock(&self, caller: &CallerCredential) -> Result<(), DeviceError> {
        self.dispatch(caller, DeviceCall::Lock).await.map(|_| ())
    }

    /// Dispatch `Unlock` for `caller`.
    pub async fn unlock(&self, caller: &CallerCredential) -> Result<(), DeviceError> {
        self.dispatch(caller, DeviceCall::Unlock).await.map(|_| ())
    }

    /// Dispatch `Status` for `caller`.
    pub async fn status(&self, caller: &CallerCredential) -> Result<LockStatus, DeviceError> {
        match self.dispatch(caller, DeviceCall::Status).await? {
            DeviceReply::Status(status) => Ok(status),
            other => Err(DeviceError::Internal { reason: format!("unexpected reply {other:?}") }),
        }
    }

    /// Current mode.
    pub fn mode(&self) -> Result<DeviceMode, DeviceError> {
        self.claim.mode()
    }

    /// Owner pattern, if claimed.
    pub fn owner(&self) -> Result<Option<BlessingPattern>, DeviceError> {
        self.claim.owner()
    }

    /// The lock handler (for inspection in tests and diagnostics).
    pub fn locks(&self) -> &LockHandler<E, A> {
        &self.locks
    }
}

impl<E, A> std::fmt::Debug for Device<E, A>
where
    E: Environment,
    A: Actuator,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("claim", &self.claim)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Device`].
///
/// Defaults: [`PatternVerifier`], [`MemoryOwnerStore`], [`DeviceConfig::default`].
pub struct DeviceBuilder<E, A>
where
    E: Environment,
    A: Actuator,
{
    env: E,
    actuator: A,
    identity: Arc<dyn DeviceIdentity>,
    verifier: Arc<dyn CredentialVerifier>,
    store: Box<dyn OwnerStore>,
    config: DeviceConfig,
}

impl<E, A> DeviceBuilder<E, A>
where
    E: Environment,
    A: Actuator,
{
    /// Use `verifier` for authorization.
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Persist the owner through `store`.
    #[must_use]
    pub fn store(mut self, store: Box<dyn OwnerStore>) -> Self {
        self.store = store;
        self
    }

    /// Override timeouts.
    #[must_use]
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the device, restoring any persisted owner before returning.
    pub fn build(self) -> Result<Device<E, A>, DeviceError> {
        let claim = ClaimStateMachine::new(self.identity, OwnerRegistry::new(self.store))?;
        let access = AccessController::new(self.verifier);
        let locks = LockHandler::new(self.env, self.actuator, self.config);

        tracing::info!("device ready in {} mode", claim.mode()?);
        Ok(Device { claim, access, locks })
    }
}
