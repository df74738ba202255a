//! Physical lock status.

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Status of the physical lock.
///
/// Encoded as its integer discriminant so the wire value stays stable
/// across releases: `Locked = 0`, `Unlocked = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum LockStatus {
    /// The bolt is engaged.
    Locked = 0,
    /// The bolt is released.
    Unlocked = 1,
}

impl LockStatus {
    /// Map the actuator's boolean view onto a status.
    pub fn from_locked(locked: bool) -> Self {
        if locked { Self::Locked } else { Self::Unlocked }
    }

    /// Whether this status means the bolt is engaged.
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Wire discriminant.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Parse a wire discriminant.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Locked),
            1 => Some(Self::Unlocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Unlocked => f.write_str("unlocked"),
        }
    }
}
