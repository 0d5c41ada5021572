//! # Wire Frames
//!
//! Purpose: Define the unit of the wire protocol and its bit-exact encoding.
//!
//! ## Memory Layout
//!
//! ```text
//! +----------------+--------+---------------------------+
//! | length:4B (BE) | tag:1B | payload:(length - 1) B    |
//! +----------------+--------+---------------------------+
//! ```
//!
//! `length` covers the tag byte plus the payload, so a tag-only message
//! (e.g. ping) is sent with `length = 1`.
//!
//! ## Design Principles
//! 1. **Immutable View**: `WireFrame` is a cheap `Bytes`-backed view that can
//!    be handed to decoders without copying.
//! 2. **Single Owner of the Convention**: all length-prefix arithmetic lives
//!    here and in `codec`; nothing else computes prefix sizes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{KvError, KvResult};
use crate::tags;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the message tag that starts every frame body.
pub const TAG_SIZE: usize = 1;

/// Default upper bound for a declared frame length (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// One complete, tagged frame.
#[derive(Clone, PartialEq, Eq)]
pub struct WireFrame {
    tag: u8,
    payload: Bytes,
}

impl WireFrame {
    /// Builds a frame from a tag and its payload bytes.
    pub fn new(tag: u8, payload: impl Into<Bytes>) -> Self {
        WireFrame {
            tag,
            payload: payload.into(),
        }
    }

    /// Builds a tag-only frame.
    pub fn empty(tag: u8) -> Self {
        WireFrame {
            tag,
            payload: Bytes::new(),
        }
    }

    /// Message tag of this frame.
    #[inline]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Payload bytes following the tag.
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes the frame, returning its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// True when this is the dedicated error frame.
    pub fn is_error(&self) -> bool {
        self.tag == tags::TAG_ERROR_RESP
    }

    /// Value written into the length prefix for this frame.
    pub fn declared_len(&self) -> usize {
        TAG_SIZE + self.payload.len()
    }

    /// Total bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.declared_len()
    }

    /// Appends the wire encoding of this frame to `out`.
    pub fn encode_into(&self, out: &mut BytesMut) -> KvResult<()> {
        encode_frame(self.tag, &self.payload, out)
    }

    /// Returns the wire encoding of this frame as a fresh buffer.
    pub fn encode(&self) -> KvResult<Bytes> {
        let mut out = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut out)?;
        Ok(out.freeze())
    }
}

impl std::fmt::Debug for WireFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireFrame")
            .field("tag", &tags::describe(self.tag))
            .field("len", &self.payload.len())
            .finish()
    }
}

/// Appends `[len:4B BE][tag][payload]` to `out`.
///
/// **Input**: message tag, payload bytes, output buffer.
/// **Output**: `MessageFormat` if the payload cannot be described by a
/// 32-bit length prefix.
pub fn encode_frame(tag: u8, payload: &[u8], out: &mut BytesMut) -> KvResult<()> {
    let declared = payload
        .len()
        .checked_add(TAG_SIZE)
        .filter(|len| *len <= u32::MAX as usize)
        .ok_or_else(|| {
            KvError::MessageFormat(format!("payload of {} bytes too large", payload.len()))
        })?;

    out.reserve(LENGTH_PREFIX_SIZE + declared);
    out.put_u32(declared as u32);
    out.put_u8(tag);
    out.put_slice(payload);
    Ok(())
}

/// Decodes one frame from the front of a fully buffered slice.
///
/// Returns `Ok(None)` when `input` does not yet hold a complete frame, or
/// `Ok(Some((frame, consumed)))` with the number of bytes used.
pub fn decode_frame(input: &[u8]) -> KvResult<Option<(WireFrame, usize)>> {
    if input.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }
    let mut prefix = &input[..LENGTH_PREFIX_SIZE];
    let declared = prefix.get_u32() as usize;
    if declared < TAG_SIZE {
        return Err(KvError::MessageFormat(
            "declared frame length 0 leaves no room for a tag".to_string(),
        ));
    }
    let total = LENGTH_PREFIX_SIZE + declared;
    if input.len() < total {
        return Ok(None);
    }

    let tag = input[LENGTH_PREFIX_SIZE];
    let payload = Bytes::copy_from_slice(&input[LENGTH_PREFIX_SIZE + TAG_SIZE..total]);
    Ok(Some((WireFrame::new(tag, payload), total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{TAG_LIST_KEYS_RESP, TAG_PING_REQ};

    #[test]
    fn ping_encodes_with_length_one() {
        let frame = WireFrame::empty(TAG_PING_REQ);
        let bytes = frame.encode().unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x00, 0x00, 0x01, TAG_PING_REQ]);
    }

    #[test]
    fn length_prefix_is_big_endian_and_covers_tag() {
        let payload = vec![7u8; 0x0102];
        let bytes = WireFrame::new(TAG_LIST_KEYS_RESP, payload).encode().unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x01, 0x03]);
        assert_eq!(bytes[4], TAG_LIST_KEYS_RESP);
        assert_eq!(bytes.len(), 4 + 1 + 0x0102);
    }

    #[test]
    fn decode_roundtrip_for_assorted_payloads() {
        let payloads: [&[u8]; 4] = [b"", b"a", b"abcd", &[0u8, 255, 1, 254]];
        for (tag, payload) in payloads.iter().enumerate() {
            let frame = WireFrame::new(tag as u8, payload.to_vec());
            let bytes = frame.encode().unwrap();
            let (decoded, used) = decode_frame(&bytes).unwrap().unwrap();
            assert_eq!(decoded, frame);
            assert_eq!(used, bytes.len());
        }
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let bytes = WireFrame::new(1, &b"abcd"[..]).encode().unwrap();
        for cut in 0..bytes.len() {
            assert!(decode_frame(&bytes[..cut]).unwrap().is_none());
        }
    }

    #[test]
    fn zero_declared_length_is_malformed() {
        let err = decode_frame(&[0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, KvError::MessageFormat(_)));
    }
}
