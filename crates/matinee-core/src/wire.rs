//! Matinee wire format — framing for all peer-to-peer traffic.
//!
//! Every message travels as one frame: a fixed header followed by the
//! payload. The header is #[repr(C, packed)] with zerocopy derives for
//! deterministic layout and allocation-free parsing. There is no unsafe
//! code in this module.
//!
//! The tag space is open: a receiver seeing an unknown tag gets a clean
//! decode error and drops the frame, so new message kinds can be added
//! without breaking older peers' handling of the existing ones.

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Frame Header ─────────────────────────────────────────────────────────────

/// Precedes every payload on the wire.
///
/// Wire size: 6 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct FrameHeader {
    /// Message kind. See the TAG_* constants.
    /// Unknown tags are rejected at decode and dropped by the router.
    pub tag: u8,

    /// Wire format version. Currently 0x01.
    /// A receiver seeing an unknown version drops the frame.
    pub version: u8,

    /// Length of the payload in bytes, not including this header.
    pub length: u32,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(FrameHeader, [u8; 6]);

// ── Tags ──────────────────────────────────────────────────────────────────────

/// Membership advertisement — the sender's known-peer list.
pub const TAG_MEMBERSHIP: u8 = 0x01;

/// Playback state snapshot.
pub const TAG_STATE: u8 = 0x02;

/// One media chunk. Payload bytes are opaque and must round-trip exactly.
pub const TAG_CHUNK: u8 = 0x03;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Current frame format version.
pub const FRAME_VERSION: u8 = 0x01;

/// Maximum payload size in bytes. Media chunks are cut at 256 KiB by the
/// producer, so this is generous headroom rather than a tight bound.
pub const MAX_FRAME_PAYLOAD: usize = 1024 * 1024;

// ── Encode / decode ───────────────────────────────────────────────────────────

/// Build a frame from a tag and payload.
pub fn encode_frame(tag: u8, payload: &[u8]) -> Result<Bytes, WireError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(WireError::PayloadTooLarge(payload.len()));
    }
    let header = FrameHeader {
        tag,
        version: FRAME_VERSION,
        length: payload.len() as u32,
    };
    let mut buf = BytesMut::with_capacity(std::mem::size_of::<FrameHeader>() + payload.len());
    buf.put_slice(header.as_bytes());
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Split a frame into its tag and payload.
///
/// The returned payload is an exact copy of the bytes after the header —
/// chunk payloads are never transformed.
pub fn decode_frame(frame: &[u8]) -> Result<(u8, Bytes), WireError> {
    let header_len = std::mem::size_of::<FrameHeader>();
    if frame.len() < header_len {
        return Err(WireError::Truncated(frame.len()));
    }
    let header = FrameHeader::read_from_prefix(frame)
        .ok_or(WireError::Truncated(frame.len()))?;
    if header.version != FRAME_VERSION {
        return Err(WireError::UnknownVersion(header.version));
    }
    let length = header.length as usize;
    if length > MAX_FRAME_PAYLOAD {
        return Err(WireError::PayloadTooLarge(length));
    }
    let payload = &frame[header_len..];
    if payload.len() != length {
        return Err(WireError::LengthMismatch {
            declared: length,
            actual: payload.len(),
        });
    }
    Ok((header.tag, Bytes::copy_from_slice(payload)))
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("frame truncated: {0} bytes, need at least the 6-byte header")]
    Truncated(usize),

    #[error("unknown frame version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("payload length {0} exceeds maximum {MAX_FRAME_PAYLOAD}")]
    PayloadTooLarge(usize),

    #[error("declared payload length {declared} but frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
