//! Operations for model-based testing.
//!
//! Operations represent every call a device can receive, plus a restart.
//! They are generated randomly by proptest and applied to both the model and
//! the real device.

use arbitrary::Arbitrary;
use latch_proto::{ErrorCode, LockStatus};

/// Index into [`NAMES`].
pub type NameId = u8;

/// Index into [`CALLERS`].
pub type CallerId = u8;

/// Claimant names. The last two are not valid blessing components.
pub const NAMES: &[&str] = &["alice", "bob", "carol", "a/b", ""];

/// Presented credentials. An empty entry means an anonymous caller.
///
/// Chosen around the `device/alice` and `device/bob` owners: exact names,
/// delegates, a string-prefix lookalike and a foreign root.
pub const CALLERS: &[&[&str]] = &[
    &["device/alice"],
    &["device/alice/phone"],
    &["device/bob"],
    &["device/alicex"],
    &["other/alice"],
    &["device/carol", "device/bob/watch"],
    &[],
];

/// Operations that can be applied to a device.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Claim with a name from [`NAMES`].
    Claim {
        /// Claimant name.
        name: NameId,
    },

    /// Lock as a caller from [`CALLERS`].
    Lock {
        /// Presenting caller.
        caller: CallerId,
    },

    /// Unlock as a caller from [`CALLERS`].
    Unlock {
        /// Presenting caller.
        caller: CallerId,
    },

    /// Read status as a caller from [`CALLERS`].
    Status {
        /// Presenting caller.
        caller: CallerId,
    },

    /// List the exposed interface.
    Describe,

    /// Rebuild the device over the same owner store and actuator.
    Restart,
}

impl Operation {
    /// Claimant name for this operation, wrapping out-of-range ids.
    pub fn name(id: NameId) -> &'static str {
        NAMES[usize::from(id) % NAMES.len()]
    }

    /// Presented names for a caller, wrapping out-of-range ids.
    pub fn caller(id: CallerId) -> &'static [&'static str] {
        CALLERS[usize::from(id) % CALLERS.len()]
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real device behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Claim succeeded with this full blessing.
    Claimed(String),

    /// Lock or Unlock completed.
    Done,

    /// Bolt position.
    Status(LockStatus),

    /// Exposed methods.
    Interface(Vec<String>),

    /// Device restarted.
    Restarted,

    /// Operation failed.
    Error(ErrorCode),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Error(_))
    }
}
