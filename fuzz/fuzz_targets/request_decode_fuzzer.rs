//! Fuzz target for request framing and dispatch
//!
//! Untrusted bytes from a socket must never crash the device.
//!
//! # Strategy
//!
//! - Raw input: arbitrary bytes fed to the frame decoder in arbitrary chunk
//!   sizes, as a TCP stream would deliver them
//! - Dispatch: every request that decodes is handed to a real device
//!
//! # Invariants
//!
//! - NEVER panic on malformed length prefixes or CBOR bodies
//! - A declared size over `MAX_FRAME_SIZE` is rejected before buffering
//! - Every decoded request gets a response echoing its id
//! - Split delivery decodes the same requests as a single read

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use bytes::BytesMut;
use latch_core::{BlessingName, Device, MemoryActuator, NamedIdentity};
use latch_harness::SimEnv;
use latch_proto::{decode_frame, ProtocolError, Request};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    data: Vec<u8>,
    chunk: u8,
}

fn decode_all(data: &[u8], chunk: usize) -> (Vec<Request>, Option<ProtocolError>) {
    let mut buf = BytesMut::new();
    let mut requests = Vec::new();

    for piece in data.chunks(chunk.max(1)) {
        buf.extend_from_slice(piece);
        loop {
            match decode_frame::<Request>(&mut buf) {
                Ok(Some(request)) => requests.push(request),
                Ok(None) => break,
                Err(e) => return (requests, Some(e)),
            }
        }
    }
    (requests, None)
}

fuzz_target!(|input: Input| {
    let (whole, whole_err) = decode_all(&input.data, input.data.len());
    let (split, split_err) = decode_all(&input.data, usize::from(input.chunk));

    assert_eq!(whole, split, "split delivery changed decoded requests");
    assert_eq!(whole_err.is_some(), split_err.is_some());

    if whole.is_empty() {
        return;
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
    let identity = NamedIdentity::new(BlessingName::parse("device").unwrap());
    let device =
        Device::builder(SimEnv::new(), MemoryActuator::new(), Arc::new(identity)).build().unwrap();

    for request in whole {
        let id = request.id;
        let response = runtime.block_on(latch_server::handle_request(&device, request));
        assert_eq!(response.id, id);
    }
});
