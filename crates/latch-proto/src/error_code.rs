//! Wire error codes.

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Error reported to a caller.
///
/// Each code corresponds to one device error kind, so callers can tell
/// them apart without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum ErrorCode {
    /// Claim attempted on a device that already has an owner.
    AlreadyClaimed = 1,
    /// Operation not exposed in the device's current mode.
    OperationUnavailable = 2,
    /// Presented credential does not satisfy the owner pattern.
    NotAuthorized = 3,
    /// Actuator reported a hardware fault.
    ActuatorFailure = 4,
    /// Actuator did not answer within its bound.
    ActuatorTimeout = 5,
    /// Claimant name is not a valid blessing component.
    InvalidName = 6,
    /// Device-side failure unrelated to the caller.
    Internal = 7,
    /// Request could not be decoded.
    BadRequest = 8,
}

impl ErrorCode {
    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ActuatorFailure | Self::ActuatorTimeout | Self::Internal)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AlreadyClaimed => "already claimed",
            Self::OperationUnavailable => "operation unavailable",
            Self::NotAuthorized => "not authorized",
            Self::ActuatorFailure => "actuator failure",
            Self::ActuatorTimeout => "actuator timeout",
            Self::InvalidName => "invalid name",
            Self::Internal => "internal error",
            Self::BadRequest => "bad request",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_cbor() {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&ErrorCode::NotAuthorized, &mut bytes).expect("encode");
        assert_eq!(bytes, vec![0x03]);

        let decoded: ErrorCode = ciborium::de::from_reader(&bytes[..]).expect("decode");
        assert_eq!(decoded, ErrorCode::NotAuthorized);
    }

    #[test]
    fn authorization_errors_are_not_retryable() {
        assert!(!ErrorCode::AlreadyClaimed.is_retryable());
        assert!(!ErrorCode::OperationUnavailable.is_retryable());
        assert!(!ErrorCode::NotAuthorized.is_retryable());
        assert!(ErrorCode::ActuatorTimeout.is_retryable());
    }
}
