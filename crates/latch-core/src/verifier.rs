//! Credential verification seam.
//!
//! The core never walks certificate chains itself. It asks a
//! [`CredentialVerifier`] whether the caller's presented credential
//! satisfies the owner pattern, and acts on the boolean.

use crate::credential::{BlessingPattern, CallerCredential};

/// Decides whether a presented credential satisfies a pattern.
///
/// Implementations must accept the pattern's own name and every valid
/// extension of it (delegation), unless the pattern is exact.
pub trait CredentialVerifier: Send + Sync {
    /// Returns true if `presented` satisfies `required`.
    fn verify(&self, presented: &CallerCredential, required: &BlessingPattern) -> bool;
}

/// Name-matching verifier.
///
/// Trusts that the transport already authenticated every presented name and
/// only applies pattern matching. Suitable when the security handshake
/// rejects unverifiable chains before a call is dispatched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternVerifier;

impl CredentialVerifier for PatternVerifier {
    fn verify(&self, presented: &CallerCredential, required: &BlessingPattern) -> bool {
        presented.names().iter().any(|name| required.matched_by(name))
    }
}
