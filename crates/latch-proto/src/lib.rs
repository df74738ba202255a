//! Latch wire protocol.
//!
//! Types exchanged between a lock device and its callers, plus the framing
//! used by the reference server. The device core only depends on
//! [`LockStatus`]; everything else here is transport surface and can be
//! replaced without touching the claim or authorization logic.
//!
//! # Framing
//!
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ len: u32 BE  │ CBOR body (len bytes)     │
//! └──────────────┴───────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error_code;
mod frame;
pub mod message;
mod status;

pub use error_code::ErrorCode;
pub use frame::{FRAME_PREFIX_SIZE, MAX_FRAME_SIZE, ProtocolError, decode_frame, encode_frame};
pub use message::{Call, CredentialPayload, Reply, Request, Response};
pub use status::LockStatus;
