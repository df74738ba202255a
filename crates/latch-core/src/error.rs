//! Device error types.

use std::time::Duration;

use latch_proto::ErrorCode;
use thiserror::Error;

use crate::{
    access::Operation, actuator::ActuatorError, claim::DeviceMode, credential::NameError,
    identity::IdentityError, owner::StoreError,
};

/// Errors surfaced to a caller of the device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Claim attempted on a claimed device, including the losing side of a
    /// claim race.
    #[error("device already claimed")]
    AlreadyClaimed,

    /// The operation is not exposed in the device's current mode.
    #[error("operation {operation} unavailable while device is {mode}")]
    OperationUnavailable {
        /// Requested method.
        operation: &'static str,
        /// Mode the device was in when the call was gated.
        mode: DeviceMode,
    },

    /// Presented credential does not satisfy the owner pattern.
    #[error("not authorized to {operation}")]
    NotAuthorized {
        /// Operation that was refused.
        operation: Operation,
    },

    /// Actuator reported a fault.
    #[error("actuator failure: {reason}")]
    ActuatorFailure {
        /// Driver-supplied description.
        reason: String,
    },

    /// Actuator did not answer in time; bolt position is unknown.
    #[error("actuator timed out after {after:?}")]
    ActuatorTimeout {
        /// Bound that was exceeded.
        after: Duration,
    },

    /// Claimant name is not a valid blessing component.
    #[error("invalid claimant name: {0}")]
    InvalidName(#[from] NameError),

    /// Device identity could not mint a credential.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Owner store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Internal invariant breach (poisoned lock).
    #[error("internal error: {reason}")]
    Internal {
        /// Description.
        reason: String,
    },
}

impl DeviceError {
    /// Returns true if the same call may succeed if repeated.
    ///
    /// Authorization and mode errors are final for the presented credential;
    /// actuator, identity and storage failures may be transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ActuatorFailure { .. }
            | Self::ActuatorTimeout { .. }
            | Self::Identity(_)
            | Self::Storage(_) => true,

            Self::AlreadyClaimed
            | Self::OperationUnavailable { .. }
            | Self::NotAuthorized { .. }
            | Self::InvalidName(_)
            | Self::Internal { .. } => false,
        }
    }

    /// Wire code reported to the caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyClaimed => ErrorCode::AlreadyClaimed,
            Self::OperationUnavailable { .. } => ErrorCode::OperationUnavailable,
            Self::NotAuthorized { .. } => ErrorCode::NotAuthorized,
            Self::ActuatorFailure { .. } => ErrorCode::ActuatorFailure,
            Self::ActuatorTimeout { .. } => ErrorCode::ActuatorTimeout,
            Self::InvalidName(_) => ErrorCode::InvalidName,
            Self::Identity(_) | Self::Storage(_) | Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Internal { reason: format!("{what} lock poisoned") }
    }
}

impl From<ActuatorError> for DeviceError {
    fn from(err: ActuatorError) -> Self {
        match err {
            ActuatorError::Timeout { after } => Self::ActuatorTimeout { after },
            ActuatorError::Fault { reason } => Self::ActuatorFailure { reason },
        }
    }
}
