//! Media sink capability — the local playback buffer the engine feeds.
//!
//! Models the subset of a real media pipeline the engine cares about:
//! appends with acceptance/back-pressure, a single-writer busy signal,
//! playback transport controls, eviction of already-played data, and
//! an end-of-stream marker.
//!
//! A sink is wired to the engine through a [`SinkSignal`] handed to the
//! factory at creation. The signal carries the sink's epoch, so signals
//! from a sink that has since been replaced by a reset land in the
//! engine loop and are discarded there.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::event::EngineEvent;

pub trait MediaSink: Send + Sync {
    /// Append bytes to the playback buffer. `Rejected` is transient
    /// (the engine retries with backoff); `Closed` and `Unsupported`
    /// end this sink instance.
    fn append(&self, data: &[u8]) -> Result<(), SinkError>;

    /// A previous append is still being committed. The engine never
    /// appends while this holds.
    fn is_busy(&self) -> bool;

    /// The sink can still accept appends.
    fn is_open(&self) -> bool;

    fn current_position(&self) -> f64;
    fn is_playing(&self) -> bool;

    fn set_position(&self, seconds: f64);
    fn play(&self);
    fn pause(&self);

    /// Mark the stream complete. Called at most once per sink instance.
    fn end_of_stream(&self) -> Result<(), SinkError>;

    /// Discard buffered media in `[from, to)` seconds.
    fn evict(&self, from: f64, to: f64) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Transient write refusal. The chunk is kept and retried.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The sink is closed; no further writes can succeed.
    #[error("sink is closed")]
    Closed,

    /// The media format cannot be played. Fatal to this sink instance;
    /// the embedder falls back to an alternate source.
    #[error("unsupported stream format: {0}")]
    Unsupported(String),

    /// Eviction did not happen this cycle. Logged and retried on the
    /// next delivery completion.
    #[error("eviction failed: {0}")]
    EvictFailed(String),
}

/// Route a sink's callbacks back into the engine loop.
///
/// Given to the [`SinkFactory`] when a sink is created; the sink
/// implementation invokes it from its own callback context. Both
/// signals are fire-and-forget — a dropped engine channel just means
/// shutdown.
#[derive(Clone)]
pub struct SinkSignal {
    events: mpsc::UnboundedSender<EngineEvent>,
    epoch: u64,
}

impl SinkSignal {
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>, epoch: u64) -> Self {
        Self { events, epoch }
    }

    /// The stream engine epoch this sink belongs to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// An accepted append finished committing.
    pub fn write_complete(&self) {
        let _ = self
            .events
            .send(EngineEvent::SinkWriteComplete { epoch: self.epoch });
    }

    /// A local play, pause, or seek settled — including ones caused by
    /// the engine itself applying a remote state. The reconciler's
    /// equality check absorbs those echoes.
    pub fn playback_event(&self) {
        let _ = self.events.send(EngineEvent::LocalPlayback);
    }
}

/// Builds a fresh sink wired to the engine. Called once at startup and
/// once per reset.
pub type SinkFactory = Box<dyn FnMut(SinkSignal) -> Arc<dyn MediaSink> + Send>;
