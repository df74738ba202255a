//! Model device - the reference implementation.
//!
//! Plain data, no locks and no actuator. Ownership is a string prefix check
//! written independently of the blessing types in `latch-core`.

use latch_proto::{ErrorCode, LockStatus};

use super::operation::{Operation, OperationResult};

/// Root name of the modelled device identity.
pub const MODEL_ROOT: &str = "device";

/// Reference model of a claimable lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDevice {
    owner: Option<String>,
    locked: bool,
}

impl ModelDevice {
    /// Fresh, unclaimed, unlocked device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner blessing, if claimed.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Bolt position.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real device's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Describe => OperationResult::Interface(self.interface()),
            Operation::Restart => OperationResult::Restarted,
            Operation::Claim { name } => self.claim(Operation::name(*name)),
            Operation::Lock { caller } => self.operate(Operation::caller(*caller), Some(true)),
            Operation::Unlock { caller } => self.operate(Operation::caller(*caller), Some(false)),
            Operation::Status { caller } => self.operate(Operation::caller(*caller), None),
        }
    }

    fn interface(&self) -> Vec<String> {
        let methods: &[&str] =
            if self.owner.is_some() { &["Lock", "Unlock", "Status"] } else { &["Claim"] };
        methods.iter().map(|m| (*m).to_string()).collect()
    }

    fn claim(&mut self, name: &str) -> OperationResult {
        if self.owner.is_some() {
            return OperationResult::Error(ErrorCode::OperationUnavailable);
        }
        if !valid_component(name) {
            return OperationResult::Error(ErrorCode::InvalidName);
        }

        let blessing = format!("{MODEL_ROOT}/{name}");
        self.owner = Some(blessing.clone());
        OperationResult::Claimed(blessing)
    }

    fn operate(&mut self, caller: &[&str], target: Option<bool>) -> OperationResult {
        let Some(owner) = &self.owner else {
            return OperationResult::Error(ErrorCode::OperationUnavailable);
        };

        let prefix = format!("{owner}/");
        let authorized = caller.iter().any(|name| *name == owner || name.starts_with(&prefix));
        if !authorized {
            return OperationResult::Error(ErrorCode::NotAuthorized);
        }

        match target {
            Some(locked) => {
                self.locked = locked;
                OperationResult::Done
            },
            None => OperationResult::Status(LockStatus::from_locked(self.locked)),
        }
    }
}

fn valid_component(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| matches!(c, '/' | ',' | '$') || c.is_whitespace() || c.is_control())
}
