//! Length-prefixed CBOR framing.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

/// Size of the big-endian length prefix.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Largest body accepted in either direction (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Framing and serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Body exceeds [`MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared or actual body size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// CBOR encoding failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Serialize `message` and append it, prefixed with its length, to `dst`.
pub fn encode_frame<T: Serialize>(message: &T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let mut body = Vec::new();
    ciborium::ser::into_writer(message, &mut body)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: body.len(), max: MAX_FRAME_SIZE });
    }

    dst.reserve(FRAME_PREFIX_SIZE + body.len());
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_FRAME_SIZE
    dst.put_u32(body.len() as u32);
    dst.put_slice(&body);
    Ok(())
}

/// Try to take one frame off the front of `src`.
///
/// Returns `Ok(None)` when `src` does not yet hold a complete frame; the
/// buffer is left untouched in that case so the caller can read more bytes
/// and try again.
pub fn decode_frame<T: DeserializeOwned>(src: &mut BytesMut) -> Result<Option<T>, ProtocolError> {
    if src.len() < FRAME_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..FRAME_PREFIX_SIZE]);
    let size = u32::from_be_bytes(prefix) as usize;

    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size, max: MAX_FRAME_SIZE });
    }

    if src.len() < FRAME_PREFIX_SIZE + size {
        return Ok(None);
    }

    src.advance(FRAME_PREFIX_SIZE);
    let body = src.split_to(size);

    ciborium::de::from_reader(&body[..])
        .map(Some)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::{Call, LockStatus, Reply, Request, Response};

    #[test]
    fn status_response_wire_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(&LockStatus::Locked, &mut buf).expect("encode");

        assert_eq!(&buf[..], &hex!("00000001 00")[..]);
    }

    #[test]
    fn partial_frame_waits_for_more() {
        let request = Request { id: 1, blessings: vec![], call: Call::Status };
        let mut full = BytesMut::new();
        encode_frame(&request, &mut full).expect("encode");

        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        let decoded: Option<Request> = decode_frame(&mut partial).expect("no error");
        assert!(decoded.is_none());
        assert_eq!(partial.len(), full.len() - 1, "buffer must be untouched");

        let decoded: Option<Request> = decode_frame(&mut full).expect("decode");
        assert_eq!(decoded, Some(request));
        assert!(full.is_empty());
    }

    #[test]
    fn two_frames_back_to_back() {
        let mut buf = BytesMut::new();
        encode_frame(&Response::ok(1, Reply::Done), &mut buf).expect("encode");
        encode_frame(&Response::ok(2, Reply::Status(LockStatus::Unlocked)), &mut buf)
            .expect("encode");

        let first: Response = decode_frame(&mut buf).expect("decode").expect("complete");
        let second: Response = decode_frame(&mut buf).expect("decode").expect("complete");

        assert_eq!(first.id, 1);
        assert_eq!(second.result, Ok(Reply::Status(LockStatus::Unlocked)));
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_prefix_is_rejected() {
        let mut buf = BytesMut::from(&hex!("00100001")[..]);
        let result: Result<Option<Request>, _> = decode_frame(&mut buf);

        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn garbage_body_is_a_decode_error() {
        let mut buf = BytesMut::from(&hex!("00000002 ffff")[..]);
        let result: Result<Option<Request>, _> = decode_frame(&mut buf);

        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut buf = BytesMut::from(&bytes[..]);
            let _ = decode_frame::<Request>(&mut buf);
        }
    }
}
