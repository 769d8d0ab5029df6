//! Message schema — the three message kinds peers exchange.
//!
//! Membership and state payloads are JSON; chunk payloads are the raw
//! frame payload, untouched. The sender's identity is never carried in
//! the payload — it comes from the connection the frame arrived on.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::wire::{
    decode_frame, encode_frame, WireError, TAG_CHUNK, TAG_MEMBERSHIP, TAG_STATE,
};

// ── Peer identity ─────────────────────────────────────────────────────────────

/// Opaque peer identifier, assigned by the transport provider.
/// Keys every peer-indexed collection in the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Playback state ────────────────────────────────────────────────────────────

/// The single shared value every peer converges on.
///
/// Replaced wholesale, never field-wise. Equality is structural and uses
/// exact f64 comparison on purpose: positions are copied verbatim between
/// peers and re-read from the holder, never recomputed, so an echoed
/// state compares bit-equal. That equality is the system's entire
/// feedback-loop suppression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Whether playback is running.
    pub playing: bool,
    /// Playback position in seconds. Never negative.
    pub position: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            playing: false,
            position: 0.0,
        }
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// The wire message kinds. One frame carries exactly one message.
#[derive(Debug, Clone)]
pub enum Message {
    /// Peer ids known to the sender. May contain duplicates — the
    /// receiver dedupes.
    Membership { peers: Vec<PeerId> },

    /// A playback state snapshot.
    State(PlaybackState),

    /// One opaque media chunk. Order-significant, no sequence number:
    /// ordering is per-connection delivery order plus append order into
    /// the receiver's single queue.
    Chunk(Bytes),
}

/// JSON shape of a membership payload.
#[derive(Serialize, Deserialize)]
struct MembershipPayload {
    peers: Vec<PeerId>,
}

impl Message {
    /// Tag byte this message is framed with.
    pub fn tag(&self) -> u8 {
        match self {
            Message::Membership { .. } => TAG_MEMBERSHIP,
            Message::State(_) => TAG_STATE,
            Message::Chunk(_) => TAG_CHUNK,
        }
    }

    /// Serialize to a complete wire frame.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        match self {
            Message::Membership { peers } => {
                let payload = serde_json::to_vec(&MembershipPayload {
                    peers: peers.clone(),
                })?;
                encode_frame(TAG_MEMBERSHIP, &payload)
            }
            Message::State(state) => {
                let payload = serde_json::to_vec(state)?;
                encode_frame(TAG_STATE, &payload)
            }
            Message::Chunk(data) => encode_frame(TAG_CHUNK, data),
        }
    }

    /// Parse a complete wire frame.
    ///
    /// Unknown tags are an error here; the router treats that error as
    /// log-and-drop, so adding a new tagged variant later does not break
    /// peers that only know these three.
    pub fn decode(frame: &[u8]) -> Result<Message, DecodeError> {
        let (tag, payload) = decode_frame(frame)?;
        match tag {
            TAG_MEMBERSHIP => {
                let body: MembershipPayload = serde_json::from_slice(&payload)
                    .map_err(|e| DecodeError::Malformed("membership", e))?;
                Ok(Message::Membership { peers: body.peers })
            }
            TAG_STATE => {
                let state: PlaybackState = serde_json::from_slice(&payload)
                    .map_err(|e| DecodeError::Malformed("state", e))?;
                Ok(Message::State(state))
            }
            TAG_CHUNK => Ok(Message::Chunk(payload)),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why an inbound frame could not be turned into a message.
/// Always non-fatal: the router logs and drops.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Frame(#[from] WireError),

    #[error("unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),

    #[error("malformed {0} payload: {1}")]
    Malformed(&'static str, serde_json::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
