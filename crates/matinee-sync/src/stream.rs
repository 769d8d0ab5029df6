//! Chunk streaming — the ordered queue between chunk arrival and the
//! media sink, with retry, eviction, reset, and end-of-stream.
//!
//! Entries come from remote peers and from the local file producer,
//! appended in arrival order into one FIFO. Only per-connection order
//! is guaranteed on the wire; chunks from different peers interleave
//! in whatever order they are delivered.
//!
//! The delivery loop is single-writer: at most one append is in flight,
//! and the sink's write-complete signal (not a recursive call) triggers
//! the next entry. Waits are never busy-spins — a busy sink, a rejected
//! write, and the end-of-stream condition all become timer events that
//! re-enter the engine loop carrying the sink epoch current at
//! scheduling time. A reset bumps the epoch, so every timer belonging
//! to the torn-down sink arrives stale and is dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use matinee_core::config::StreamConfig;
use tokio::sync::mpsc;

use crate::event::EngineEvent;
use crate::sink::{MediaSink, SinkError, SinkFactory, SinkSignal};

pub struct ChunkStream {
    queue: VecDeque<Bytes>,
    /// Queue depth mirror the producer polls for throttling.
    depth: Arc<AtomicUsize>,
    sink: Arc<dyn MediaSink>,
    make_sink: SinkFactory,
    /// Bumped on every reset; stale-epoch events are ignored.
    epoch: u64,
    /// An accepted append has not yet signaled write-complete.
    awaiting_write: bool,
    /// A busy/reject retry timer is pending; don't stack another.
    retry_armed: bool,
    /// The producer has enqueued the final slice.
    finishing: bool,
    eos_sent: bool,
    events: mpsc::UnboundedSender<EngineEvent>,
    cfg: StreamConfig,
}

impl ChunkStream {
    pub fn new(
        mut make_sink: SinkFactory,
        cfg: StreamConfig,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        let sink = make_sink(SinkSignal::new(events.clone(), 0));
        Self {
            queue: VecDeque::new(),
            depth: Arc::new(AtomicUsize::new(0)),
            sink,
            make_sink,
            epoch: 0,
            awaiting_write: false,
            retry_armed: false,
            finishing: false,
            eos_sent: false,
            events,
            cfg,
        }
    }

    pub fn sink(&self) -> &Arc<dyn MediaSink> {
        &self.sink
    }

    pub fn sink_open(&self) -> bool {
        self.sink.is_open()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Handle for the producer's back-pressure check.
    pub fn depth_gauge(&self) -> Arc<AtomicUsize> {
        self.depth.clone()
    }

    /// Append one chunk and kick the delivery loop.
    pub fn enqueue(&mut self, chunk: Bytes) {
        self.queue.push_back(chunk);
        self.sync_depth();
        self.pump();
    }

    /// One delivery step. Re-entrant safe: while an append is in flight
    /// or a retry timer is pending this does nothing, so callers may
    /// invoke it freely on every enqueue.
    pub fn pump(&mut self) {
        if self.awaiting_write || self.retry_armed {
            return;
        }
        if !self.sink.is_open() {
            // Unrecoverable until a reset swaps the sink in; entries
            // stay queued so no data is lost.
            return;
        }
        if self.sink.is_busy() {
            self.retry_armed = true;
            self.schedule(
                EngineEvent::BusyRetry { epoch: self.epoch },
                self.cfg.busy_retry_ms,
            );
            return;
        }
        let Some(chunk) = self.queue.pop_front() else {
            // Idle until the next enqueue or sink-ready signal.
            return;
        };
        self.sync_depth();

        match self.sink.append(&chunk) {
            Ok(()) => {
                self.awaiting_write = true;
            }
            Err(SinkError::Rejected(reason)) => {
                tracing::warn!(
                    len = chunk.len(),
                    reason,
                    backoff_ms = self.cfg.reject_backoff_ms,
                    "sink rejected chunk, will retry"
                );
                self.queue.push_front(chunk);
                self.sync_depth();
                self.retry_armed = true;
                self.schedule(
                    EngineEvent::RejectRetry { epoch: self.epoch },
                    self.cfg.reject_backoff_ms,
                );
            }
            Err(e) => {
                // Closed or unsupported: this sink is done. Keep the
                // chunk at the head for the post-reset sink.
                tracing::warn!(error = %e, "sink unusable, holding chunk for reset");
                self.queue.push_front(chunk);
                self.sync_depth();
            }
        }
    }

    /// The sink committed an accepted append.
    pub fn on_write_complete(&mut self, epoch: u64) {
        if epoch != self.epoch {
            return;
        }
        self.awaiting_write = false;
        self.maybe_evict();
        self.pump();
    }

    /// A busy-sink or rejected-write retry timer fired.
    pub fn on_retry(&mut self, epoch: u64) {
        if epoch != self.epoch {
            return;
        }
        self.retry_armed = false;
        self.pump();
    }

    /// Evict media older than the retention window. Failures only mean
    /// memory is not reclaimed this cycle; the next write-complete
    /// retries.
    fn maybe_evict(&self) {
        let position = self.sink.current_position();
        if position <= self.cfg.retention_secs {
            return;
        }
        let cutoff = position - self.cfg.retention_secs;
        if let Err(e) = self.sink.evict(0.0, cutoff) {
            tracing::warn!(cutoff, error = %e, "eviction failed, skipping this cycle");
        }
    }

    /// Full reset: end and detach the current sink, drop all queued
    /// entries, attach a fresh sink, and invalidate every outstanding
    /// timer and write-complete signal. Safe mid-delivery.
    pub fn reset(&mut self) {
        if self.sink.is_open() {
            if let Err(e) = self.sink.end_of_stream() {
                tracing::warn!(error = %e, "ending old sink failed during reset");
            }
        }
        self.queue.clear();
        self.sync_depth();
        self.epoch += 1;
        self.awaiting_write = false;
        self.retry_armed = false;
        self.finishing = false;
        self.eos_sent = false;
        self.sink = (self.make_sink)(SinkSignal::new(self.events.clone(), self.epoch));
        tracing::info!(epoch = self.epoch, "media sink reset");
    }

    /// The producer enqueued the file's final slice: start watching for
    /// the queue to drain so the stream can be ended exactly once.
    pub fn finish(&mut self) {
        if self.finishing {
            return;
        }
        self.finishing = true;
        self.schedule(
            EngineEvent::EosPoll { epoch: self.epoch },
            self.cfg.eos_poll_ms,
        );
    }

    /// End-of-stream watcher poll.
    pub fn on_eos_poll(&mut self, epoch: u64) {
        if epoch != self.epoch || !self.finishing || self.eos_sent {
            return;
        }
        if self.queue.is_empty() && !self.awaiting_write && !self.sink.is_busy() {
            self.eos_sent = true;
            match self.sink.end_of_stream() {
                Ok(()) => tracing::info!("stream complete, sink closed"),
                Err(e) => tracing::warn!(error = %e, "end_of_stream failed"),
            }
        } else {
            self.schedule(
                EngineEvent::EosPoll { epoch: self.epoch },
                self.cfg.eos_poll_ms,
            );
        }
    }

    fn sync_depth(&self) {
        self.depth.store(self.queue.len(), Ordering::Release);
    }

    fn schedule(&self, event: EngineEvent, delay_ms: u64) {
        let tx = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = tx.send(event);
        });
    }
}
