//! Server error types.

use latch_core::{DeviceError, StoreError};
use latch_proto::ProtocolError;

/// Errors that can occur in the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Identity key could not be loaded or created
    #[error("identity error: {0}")]
    Identity(String),

    /// Device could not be constructed
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        Self::Device(DeviceError::Storage(err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
