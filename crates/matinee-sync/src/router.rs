//! Dispatch router — the single consumer loop.
//!
//! Everything that mutates engine state funnels through one channel:
//! connection lifecycle, inbound frames, local media signals, and timer
//! expiries. The router decodes, routes by message tag, and is the one
//! outbound broadcast point. It holds no protocol state of its own —
//! the registry, reconciler, and chunk stream do.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use matinee_core::config::StreamConfig;
use matinee_core::{Message, PeerId};
use tokio::sync::{broadcast, mpsc};

use crate::event::EngineEvent;
use crate::mesh;
use crate::reconcile::Reconciler;
use crate::registry::ConnectionRegistry;
use crate::sink::SinkFactory;
use crate::stream::ChunkStream;
use crate::transport::Transport;

pub struct Router {
    local_id: PeerId,
    transport: Arc<dyn Transport>,
    registry: ConnectionRegistry,
    reconciler: Reconciler,
    stream: ChunkStream,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    shutdown: broadcast::Receiver<()>,
}

/// What the embedder keeps after spawning the router: the event channel
/// (doubles as the transport's incoming-connection callback), the
/// registry for the peer-list display, and the queue gauge the local
/// file producer throttles on.
#[derive(Clone)]
pub struct RouterHandle {
    pub events: mpsc::UnboundedSender<EngineEvent>,
    pub registry: ConnectionRegistry,
    pub queue_depth: Arc<AtomicUsize>,
}

impl Router {
    pub fn new(
        transport: Arc<dyn Transport>,
        make_sink: SinkFactory,
        cfg: StreamConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, RouterHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let registry = ConnectionRegistry::new();
        let stream = ChunkStream::new(make_sink, cfg, events_tx.clone());

        let handle = RouterHandle {
            events: events_tx.clone(),
            registry: registry.clone(),
            queue_depth: stream.depth_gauge(),
        };
        let router = Self {
            local_id: transport.local_id().clone(),
            transport,
            registry,
            reconciler: Reconciler::new(),
            stream,
            events_tx,
            events_rx,
            shutdown,
        };
        (router, handle)
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(peer = %self.local_id, "router shutting down");
                    return Ok(());
                }

                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        tracing::info!("event channel closed, router exiting");
                        return Ok(());
                    };
                    self.handle_event(event);
                }
            }
        }
    }

    // Never awaits: long waits (dials, retries, polls) are spawned
    // continuations that re-enter the channel, so the loop keeps
    // consuming while they run.
    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::ConnectionOpened(connection) => {
                let peer = connection.peer_id().clone();
                // Advertise before registering: the snapshot must list
                // everyone but the peer we are greeting.
                let advert = mesh::advertisement(&self.registry);
                if let Err(e) = connection.send(&advert) {
                    tracing::warn!(peer = %peer, error = %e, "advertisement send failed");
                }
                self.registry.add(connection);
                tracing::info!(peer = %peer, mesh_size = self.registry.len(), "connection open");
            }

            EngineEvent::ConnectionClosed(peer) => {
                if self.registry.remove(&peer).is_some() {
                    tracing::info!(peer = %peer, mesh_size = self.registry.len(), "connection closed");
                }
            }

            EngineEvent::Inbound { from, frame } => match Message::decode(&frame) {
                Ok(message) => self.route(from, message),
                Err(e) => {
                    tracing::warn!(peer = %from, error = %e, "dropping undecodable frame");
                }
            },

            EngineEvent::LocalPlayback => {
                if let Some(state) = self.reconciler.local_event(self.stream.sink().as_ref()) {
                    tracing::debug!(
                        playing = state.playing,
                        position = state.position,
                        "broadcasting local playback state"
                    );
                    self.registry.broadcast(&Message::State(state));
                }
            }

            EngineEvent::LocalChunk(data) => {
                // Ingest locally and fan out — every locally-read slice
                // does both.
                self.registry.broadcast(&Message::Chunk(data.clone()));
                if !self.stream.sink_open() {
                    tracing::warn!("local chunk with sink closed, resetting");
                    self.stream.reset();
                }
                self.stream.enqueue(data);
            }

            EngineEvent::SourceFinished => self.stream.finish(),

            EngineEvent::SinkWriteComplete { epoch } => self.stream.on_write_complete(epoch),
            EngineEvent::BusyRetry { epoch } | EngineEvent::RejectRetry { epoch } => {
                self.stream.on_retry(epoch)
            }
            EngineEvent::EosPoll { epoch } => self.stream.on_eos_poll(epoch),

            EngineEvent::ResetSink => self.stream.reset(),
        }
    }

    fn route(&mut self, from: PeerId, message: Message) {
        match message {
            Message::Membership { peers } => {
                let started = mesh::handle_advertisement(
                    peers,
                    &self.local_id,
                    &self.registry,
                    &self.transport,
                    &self.events_tx,
                );
                if started > 0 {
                    tracing::debug!(peer = %from, started, "advertisement started dials");
                }
            }

            Message::State(state) => {
                if self
                    .reconciler
                    .apply_remote(state, self.stream.sink().as_ref())
                {
                    tracing::debug!(
                        peer = %from,
                        playing = state.playing,
                        position = state.position,
                        "applied remote playback state"
                    );
                }
            }

            Message::Chunk(data) => {
                if !self.stream.sink_open() {
                    tracing::warn!(peer = %from, "chunk arrived with sink closed, resetting");
                    self.stream.reset();
                }
                self.stream.enqueue(data);
            }
        }
    }
}
