//! Deterministic test harness for latch devices.
//!
//! Seeded implementations of the Environment and Actuator traits for
//! reproducible testing under actuator faults and timeouts.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of a device.
//! Operations are applied to both the model and a real [`latch_core::Device`],
//! and their results are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaotic_actuator;
pub mod model;
pub mod sim_env;

pub use chaotic_actuator::{ChaosConfig, ChaoticActuator};
pub use model::{
    CALLERS, CallerId, ModelDevice, NAMES, NameId, Operation, OperationResult,
};
pub use sim_env::SimEnv;
