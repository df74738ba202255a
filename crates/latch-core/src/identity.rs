//! Device identity.
//!
//! The device's own blessing is the root every owner credential is derived
//! from: claiming as `alice` on a device blessed `device` yields
//! `device/alice`.

use crate::credential::{BlessingName, IssuedCredential, NameError};

/// Errors minting a credential.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The extended name is not a valid blessing.
    #[error("cannot extend device identity: {0}")]
    InvalidExtension(#[from] NameError),

    /// The signing backend failed.
    #[error("signing failed: {reason}")]
    Signing {
        /// Backend-specific reason.
        reason: String,
    },
}

/// Source of credentials for claimants.
pub trait DeviceIdentity: Send + Sync {
    /// The device's own blessing name.
    fn name(&self) -> &BlessingName;

    /// Mint a credential naming `extension` as a delegate of this device.
    fn extend_with(&self, extension: &BlessingName) -> Result<IssuedCredential, IdentityError>;
}

/// Identity that issues unsigned credentials.
///
/// Useful wherever the verifier trusts names authenticated elsewhere, and in
/// tests.
#[derive(Debug, Clone)]
pub struct NamedIdentity {
    name: BlessingName,
}

impl NamedIdentity {
    /// Identity blessed as `name`.
    pub fn new(name: BlessingName) -> Self {
        Self { name }
    }
}

impl DeviceIdentity for NamedIdentity {
    fn name(&self) -> &BlessingName {
        &self.name
    }

    fn extend_with(&self, extension: &BlessingName) -> Result<IssuedCredential, IdentityError> {
        let blessing = self.name.extend(extension)?;
        Ok(IssuedCredential::unsigned(blessing))
    }
}
