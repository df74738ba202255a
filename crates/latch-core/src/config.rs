//! Device configuration.

use std::time::Duration;

/// Default bound on a single Lock/Unlock actuation.
pub const DEFAULT_ACTUATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a direct actuator read.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// Tunables for a [`Device`](crate::Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// How long a Lock/Unlock may take before it is reported as
    /// `ActuatorTimeout`.
    pub actuation_timeout: Duration,
    /// How long a direct status read may take.
    pub status_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { actuation_timeout: DEFAULT_ACTUATION_TIMEOUT, status_timeout: DEFAULT_STATUS_TIMEOUT }
    }
}
