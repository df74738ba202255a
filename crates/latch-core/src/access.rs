//! Access controller.
//!
//! Every claimed-mode operation is authorized here before it reaches the
//! lock handler. The decision is delegated to a [`CredentialVerifier`] with
//! the owner pattern as the requirement.

use std::{fmt, sync::Arc};

use crate::{
    credential::{BlessingPattern, CallerCredential},
    error::DeviceError,
    verifier::CredentialVerifier,
};

/// Operations gated by the access controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Engage the bolt.
    Lock,
    /// Release the bolt.
    Unlock,
    /// Read the bolt position.
    Status,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => f.write_str("lock"),
            Self::Unlock => f.write_str("unlock"),
            Self::Status => f.write_str("read status"),
        }
    }
}

/// Checks callers against the owner pattern.
#[derive(Clone)]
pub struct AccessController {
    verifier: Arc<dyn CredentialVerifier>,
}

impl AccessController {
    /// Controller deciding through `verifier`.
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    /// Allow or deny `operation` for `caller`.
    ///
    /// `owner` must come from the same state snapshot the mode gate used.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::NotAuthorized` when the verifier rejects the
    /// credential. No other side effects.
    pub fn authorize(
        &self,
        caller: &CallerCredential,
        owner: &BlessingPattern,
        operation: Operation,
    ) -> Result<(), DeviceError> {
        if self.verifier.verify(caller, owner) {
            tracing::debug!("{} allowed {}", caller, operation);
            Ok(())
        } else {
            tracing::warn!("{} denied {} (owner pattern {})", caller, operation, owner);
            Err(DeviceError::NotAuthorized { operation })
        }
    }
}

impl fmt::Debug for AccessController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessController").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{credential::BlessingName, verifier::PatternVerifier};

    fn controller() -> AccessController {
        AccessController::new(Arc::new(PatternVerifier))
    }

    fn owner() -> BlessingPattern {
        BlessingPattern::parse("device/alice").unwrap()
    }

    #[test]
    fn owner_and_delegates_are_allowed() {
        let access = controller();
        for presented in ["device/alice", "device/alice/phone", "device/alice/phone/app"] {
            let caller = CallerCredential::from_presented([presented]);
            assert!(access.authorize(&caller, &owner(), Operation::Lock).is_ok(), "{presented}");
        }
    }

    #[test]
    fn strangers_are_denied() {
        let access = controller();
        for presented in ["device/mallory", "device", "device/alicex", "other/alice"] {
            let caller = CallerCredential::from_presented([presented]);
            let result = access.authorize(&caller, &owner(), Operation::Unlock);
            assert!(
                matches!(result, Err(DeviceError::NotAuthorized { operation: Operation::Unlock })),
                "{presented}"
            );
        }
    }

    #[test]
    fn anonymous_is_denied() {
        let result = controller().authorize(&CallerCredential::anonymous(), &owner(), Operation::Status);
        assert!(matches!(result, Err(DeviceError::NotAuthorized { .. })));
    }

    proptest! {
        #[test]
        fn allowed_iff_extension_of_owner(
            under_owner in any::<bool>(),
            tail in proptest::collection::vec("[a-z]{1,6}", 0..4),
        ) {
            let mut components: Vec<String> = if under_owner {
                vec!["device".to_string(), "alice".to_string()]
            } else {
                vec!["device".to_string()]
            };
            components.extend(tail);

            let name = BlessingName::parse(components.join("/")).unwrap();
            let caller = CallerCredential::new(vec![name.clone()]);
            let allowed = controller().authorize(&caller, &owner(), Operation::Lock).is_ok();

            let expected = components.len() >= 2 && components[1] == "alice";
            prop_assert_eq!(allowed, expected);
            prop_assert_eq!(allowed, name.is_extension_of(owner().name()));
        }
    }
}
