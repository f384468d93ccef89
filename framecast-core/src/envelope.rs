//! Length-prefixed wire unit.
//!
//! ```text
//! offset 0 : u32 BE  payload_length (L)
//! offset 4 : [u8; L] payload
//! ```
//!
//! The header is the only framing information on the wire. A receiver
//! reads exactly [`LENGTH_PREFIX_SIZE`] bytes, then exactly `L` bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::StreamError;
use crate::pipeline::encoder::EncodedPayload;

/// Width of the length field in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload the length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

// ── Envelope ─────────────────────────────────────────────────────

/// One framed payload, ready to be written to the stream.
///
/// Construct through [`frame`] or [`Envelope::new`]; both validate the
/// length, so `header()` always matches `payload().len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    header: [u8; LENGTH_PREFIX_SIZE],
    payload: Bytes,
}

impl Envelope {
    /// Wrap `payload` with its big-endian length.
    pub fn new(payload: impl Into<Bytes>) -> Result<Self, StreamError> {
        let payload = payload.into();
        let len = checked_len(payload.len())?;
        Ok(Self {
            header: len.to_be_bytes(),
            payload,
        })
    }

    /// The 4-byte length prefix.
    pub fn header(&self) -> &[u8; LENGTH_PREFIX_SIZE] {
        &self.header
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Declared payload length.
    pub fn payload_len(&self) -> u32 {
        u32::from_be_bytes(self.header)
    }

    /// Total bytes this envelope occupies on the wire.
    pub fn wire_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.payload.len()
    }

    /// Serialise prefix and payload into `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_len());
        dst.put_slice(&self.header);
        dst.put_slice(&self.payload);
    }

    /// Contiguous wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

// ── Framing ──────────────────────────────────────────────────────

/// Frame an encoded payload.
///
/// Fails with [`StreamError::PayloadTooLarge`] when the payload cannot be
/// described by the 4-byte length field. The length is never truncated.
pub fn frame(payload: EncodedPayload) -> Result<Envelope, StreamError> {
    Envelope::new(payload.data)
}

/// Validate a payload length against the prefix width.
pub fn checked_len(len: usize) -> Result<u32, StreamError> {
    u32::try_from(len).map_err(|_| StreamError::PayloadTooLarge {
        size: len,
        max: MAX_PAYLOAD_SIZE,
    })
}

/// Parse one complete envelope from the front of `data`.
///
/// Returns the payload and the number of bytes consumed, or `None` if
/// `data` does not yet hold a whole envelope.
pub fn decode_envelope(data: &[u8]) -> Option<(&[u8], usize)> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = data.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    let len = u32::from_be_bytes(prefix) as usize;
    let end = LENGTH_PREFIX_SIZE.checked_add(len)?;
    let payload = data.get(LENGTH_PREFIX_SIZE..end)?;
    Some((payload, end))
}

// ── Tests ────────────────────────────────────────────────────────
