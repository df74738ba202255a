//! Reference model for model-based testing.
//!
//! The model is a simplified device that captures the observable behavior
//! of a claimable lock without its concurrency machinery. It serves as the
//! oracle against which [`latch_core::Device`] is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Behavior not implementation: Captures WHAT, not HOW
//! - Deterministic: Same inputs produce same outputs

mod device;
pub mod operation;

pub use device::{MODEL_ROOT, ModelDevice};
pub use operation::{CALLERS, CallerId, NAMES, NameId, Operation, OperationResult};
