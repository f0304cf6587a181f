//! Length-prefixed envelope codec.
//!
//! ## Wire format
//!
//! ```text
//! length:   u32 big-endian  (4)
//! payload:  [u8; length]    (variable, may be empty)
//! ```
//!
//! No magic, version or checksum. Ordering relies on the single-writer,
//! in-order stream underneath.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FramecastError;

/// Size of the length prefix in bytes.
pub const PREFIX_LEN: usize = 4;

/// Largest payload the 32-bit prefix can describe.
pub const MAX_ENVELOPE_PAYLOAD: usize = u32::MAX as usize;

/// Default upper bound on a received payload.
pub const DEFAULT_MAX_RECEIVE_PAYLOAD: usize = 256 * 1024 * 1024;

/// `tokio_util` codec for frame envelopes.
///
/// The decoder never yields a partial payload. A stream that ends inside
/// a prefix or payload finishes cleanly (`None`) rather than erroring.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_payload: usize,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self {
            max_payload: DEFAULT_MAX_RECEIVE_PAYLOAD,
        }
    }

    /// Reject received prefixes larger than `max_payload`.
    ///
    /// A corrupted prefix desynchronises the stream for good; the limit
    /// turns that into an immediate error instead of a huge allocation.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            max_payload: max_payload.min(MAX_ENVELOPE_PAYLOAD),
        }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Bytes;
    type Error = FramecastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PREFIX_LEN {
            src.reserve(PREFIX_LEN - src.len());
            return Ok(None);
        }

        let mut prefix = [0u8; PREFIX_LEN];
        prefix.copy_from_slice(&src[..PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > self.max_payload {
            return Err(FramecastError::PayloadTooLarge {
                size: len,
                max: self.max_payload,
            });
        }

        let total = PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(PREFIX_LEN);
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None => {
                if !src.is_empty() {
                    tracing::debug!(pending = src.len(), "stream closed mid-envelope");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for EnvelopeCodec {
    type Error = FramecastError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if payload.len() > MAX_ENVELOPE_PAYLOAD {
            return Err(FramecastError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_ENVELOPE_PAYLOAD,
            });
        }

        // Prefix and payload land in one buffer so they go out in a
        // single write.
        dst.reserve(PREFIX_LEN + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &[u8]) -> BytesMut {
        let mut dst = BytesMut::new();
        EnvelopeCodec::new()
            .encode(Bytes::copy_from_slice(payload), &mut dst)
            .unwrap();
        dst
    }

    #[test]
    fn prefix_is_big_endian() {
        let wire = encode(b"abc");
        assert_eq!(&wire[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn empty_payload_is_a_bare_prefix() {
        let mut wire = encode(b"");
        assert_eq!(&wire[..], &[0, 0, 0, 0]);

        let decoded = EnvelopeCodec::new().decode(&mut wire).unwrap();
        assert_eq!(decoded.as_deref(), Some(&b""[..]));
        assert!(wire.is_empty());
    }

    #[test]
    fn waits_for_complete_prefix_and_payload() {
        let mut codec = EnvelopeCodec::new();
        let mut src = BytesMut::from(&[0u8, 0][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(&[0, 5, b'h', b'e']);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"llo");
        assert_eq!(codec.decode(&mut src).unwrap().as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn decodes_back_to_back_envelopes() {
        let mut src = encode(b"one");
        src.extend_from_slice(&encode(b"two"));
        let mut codec = EnvelopeCodec::new();
        assert_eq!(codec.decode(&mut src).unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(codec.decode(&mut src).unwrap().as_deref(), Some(&b"two"[..]));
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn oversized_prefix_is_rejected() {
        let mut codec = EnvelopeCodec::with_max_payload(16);
        let mut src = BytesMut::from(&[0u8, 0, 1, 0][..]);
        let err = codec.decode(&mut src).unwrap_err();
        assert!(matches!(
            err,
            FramecastError::PayloadTooLarge { size: 256, max: 16 }
        ));
    }

    #[test]
    fn eof_mid_payload_ends_stream() {
        let mut codec = EnvelopeCodec::new();
        let mut src = BytesMut::from(&[0u8, 0, 0, 10, 1, 2, 3][..]);
        assert!(codec.decode_eof(&mut src).unwrap().is_none());
        assert!(src.is_empty());
    }
}
