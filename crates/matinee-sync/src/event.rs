//! Engine events — everything the router's consumer loop reacts to.
//!
//! One channel multiplexes connection lifecycle, inbound frames, local
//! media signals, and timer expiries. Events that act on the media sink
//! carry the sink epoch captured when they were scheduled; the stream
//! engine drops events whose epoch is stale, which is how a reset
//! invalidates in-flight retry timers that cannot be revoked.

use std::sync::Arc;

use bytes::Bytes;
use matinee_core::PeerId;

use crate::transport::PeerConnection;

pub enum EngineEvent {
    /// A logical connection finished its open handshake — either we
    /// dialed, or the transport accepted an incoming peer.
    ConnectionOpened(Arc<dyn PeerConnection>),

    /// A connection closed (remote hangup or transport error).
    ConnectionClosed(PeerId),

    /// A raw frame arrived from a connected peer.
    Inbound { from: PeerId, frame: Bytes },

    /// A play, pause, or seek settled on the local media sink.
    LocalPlayback,

    /// The local file producer read one chunk.
    LocalChunk(Bytes),

    /// The local file producer read the final chunk.
    SourceFinished,

    /// The sink finished an accepted write.
    SinkWriteComplete { epoch: u64 },

    /// Retry timer: the sink reported a write in progress.
    BusyRetry { epoch: u64 },

    /// Retry timer: the sink rejected a write.
    RejectRetry { epoch: u64 },

    /// End-of-stream watcher poll.
    EosPoll { epoch: u64 },

    /// Tear down the current sink and start fresh (new local source
    /// selected, or the sink entered an unrecoverable state).
    ResetSink,
}
