//! Latch device core.
//!
//! Everything that decides who may operate a lock device and in which order
//! physical actuations happen. Transport, credential cryptography, the
//! actuator driver and durable storage are collaborators reached through
//! traits.
//!
//! ## Architecture
//!
//! ```text
//! Device::dispatch(caller, call)
//!   ├─ mode gate           (DeviceState: Unclaimed | Claimed)
//!   │    └─ ClaimStateMachine ── DeviceIdentity, OwnerRegistry/OwnerStore
//!   ├─ AccessController    (CredentialVerifier against owner pattern)
//!   └─ LockHandler         (serialized Actuator access + status cache)
//! ```
//!
//! ## Invariants
//!
//! - A device is claimed at most once per process lifetime; concurrent
//!   claimants observe exactly one winner.
//! - The owner pattern exists iff the device is claimed, and a call that
//!   observes `Claimed` observes the pattern in the same critical section.
//! - No two actuations overlap. Status never reports a value that was not
//!   the bolt position at some real point in time, and never reports a
//!   cached value after a failed actuation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod actuator;
pub mod claim;
pub mod config;
pub mod credential;
pub mod device;
pub mod env;
pub mod error;
pub mod identity;
pub mod lock;
pub mod owner;
pub mod verifier;

pub use access::{AccessController, Operation};
pub use actuator::{Actuator, ActuatorError, MemoryActuator};
pub use claim::{ClaimStateMachine, DeviceMode, DeviceState};
pub use config::DeviceConfig;
pub use credential::{BlessingName, BlessingPattern, CallerCredential, IssuedCredential, NameError};
pub use device::{Device, DeviceBuilder, DeviceCall, DeviceReply};
pub use env::Environment;
pub use error::DeviceError;
pub use identity::{DeviceIdentity, IdentityError, NamedIdentity};
pub use latch_proto::LockStatus;
pub use lock::LockHandler;
pub use owner::{MemoryOwnerStore, OwnerRegistry, OwnerStore, StoreError};
pub use verifier::{CredentialVerifier, PatternVerifier};
