//! Request and response payloads.
//!
//! A device serves two mutually exclusive interfaces: the unclaimed one
//! (`Claim`) and the claimed one (`Lock`, `Unlock`, `Status`). Both travel
//! as [`Call`] variants; the device decides which are reachable.

use serde::{Deserialize, Serialize};

use crate::{ErrorCode, LockStatus};

/// A single call on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    /// Take ownership of an unclaimed device.
    Claim {
        /// Blessing component the device extends its own identity with.
        name: String,
    },
    /// Engage the bolt.
    Lock,
    /// Release the bolt.
    Unlock,
    /// Read the bolt position.
    Status,
    /// List the methods exposed in the device's current mode.
    Describe,
}

impl Call {
    /// Method name as it appears in interface descriptions.
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

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Caller-chosen id echoed in the response.
    pub id: u64,
    /// Blessing names the caller presents.
    ///
    /// The transport's security handshake is responsible for these being
    /// authentic.
    #[serde(default)]
    pub blessings: Vec<String>,
    /// The call itself.
    pub call: Call,
}

/// Credential handed to a successful claimant.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl redacts `signature` so issued
///   credentials never end up verbatim in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    /// Full blessing name, e.g. `device/alice`.
    pub blessing: String,
    /// Pattern the device now authorizes.
    pub pattern: String,
    /// Issuer public key (empty when the identity does not sign).
    #[serde(default)]
    pub issuer_key: Vec<u8>,
    /// Issuer signature over the blessing (empty when unsigned).
    #[serde(default)]
    pub signature: Vec<u8>,
}

impl std::fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPayload")
            .field("blessing", &self.blessing)
            .field("pattern", &self.pattern)
            .field("issuer_key", &format!("<{} bytes>", self.issuer_key.len()))
            .field("signature", &format!("<redacted {} bytes>", self.signature.len()))
            .finish()
    }
}

/// Successful reply payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Claim succeeded.
    Claimed(CredentialPayload),
    /// Lock or Unlock completed.
    Done,
    /// Current bolt position.
    Status(LockStatus),
    /// Methods exposed in the current mode.
    Interface(Vec<String>),
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers.
    pub id: u64,
    /// Outcome.
    pub result: Result<Reply, ErrorCode>,
}

impl Response {
    /// Successful response.
    pub fn ok(id: u64, reply: Reply) -> Self {
        Self { id, result: Ok(reply) }
    }

    /// Failed response.
    pub fn err(id: u64, code: ErrorCode) -> Self {
        Self { id, result: Err(code) }
    }
}
