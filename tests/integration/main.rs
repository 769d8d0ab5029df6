//! Matinee integration test harness.
//!
//! Peers run real routers wired together through an in-memory transport
//! hub; the media sink is a scripted fake that signals write-complete
//! on accepted appends and fires playback events when driven, the way a
//! real player element does. Tests exercise whole scenarios: mesh
//! convergence, lockstep playback, and chunk relay under back-pressure.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc};

use matinee_core::config::StreamConfig;
use matinee_core::{Message, PeerId};
use matinee_sync::{
    EngineEvent, MediaSink, PeerConnection, Router, RouterHandle, SinkError, SinkFactory,
    SinkSignal, Transport, TransportError,
};

mod playback;

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Fast timers so scenarios settle in tens of milliseconds.
pub fn test_stream_cfg() -> StreamConfig {
    StreamConfig {
        chunk_size: 8,
        queue_window: 3,
        busy_retry_ms: 5,
        reject_backoff_ms: 5,
        producer_poll_ms: 5,
        eos_poll_ms: 5,
        ..StreamConfig::default()
    }
}

/// Poll `f` every 10 ms until it holds or `deadline_ms` passes.
pub async fn wait_until(deadline_ms: u64, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(deadline_ms);
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    f()
}

// ── In-memory transport ───────────────────────────────────────────────────────

/// Stands in for the signaling/transport provider: knows every peer's
/// event channel and mints connection pairs, like a data-channel dial
/// that hands a connection object to both ends.
pub struct MemoryHub {
    peers: DashMap<PeerId, mpsc::UnboundedSender<EngineEvent>>,
    dial_count: AtomicUsize,
    frames_sent: AtomicUsize,
    dial_delay_ms: AtomicU64,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            peers: DashMap::new(),
            dial_count: AtomicUsize::new(0),
            frames_sent: AtomicUsize::new(0),
            dial_delay_ms: AtomicU64::new(0),
        })
    }

    /// Make every subsequent dial take `ms` to resolve, like a WAN
    /// signaling round-trip.
    pub fn set_dial_delay(&self, ms: u64) {
        self.dial_delay_ms.store(ms, Ordering::Release);
    }

    pub fn dial_count(&self) -> usize {
        self.dial_count.load(Ordering::Acquire)
    }

    pub fn frames_sent(&self) -> usize {
        self.frames_sent.load(Ordering::Acquire)
    }

    fn attach(&self, id: PeerId, events: mpsc::UnboundedSender<EngineEvent>) {
        self.peers.insert(id, events);
    }
}

pub struct HubTransport {
    hub: Arc<MemoryHub>,
    local: PeerId,
}

impl Transport for HubTransport {
    fn local_id(&self) -> &PeerId {
        &self.local
    }

    fn connect<'a>(
        &'a self,
        peer: &'a PeerId,
    ) -> BoxFuture<'a, Result<Arc<dyn PeerConnection>, TransportError>> {
        Box::pin(async move {
            let delay = self.hub.dial_delay_ms.load(Ordering::Acquire);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.hub.dial_count.fetch_add(1, Ordering::AcqRel);
            let remote_tx = self
                .hub
                .peers
                .get(peer)
                .map(|e| e.value().clone())
                .ok_or_else(|| {
                    TransportError::ConnectFailed(peer.clone(), "no such peer".into())
                })?;
            let local_tx = self
                .hub
                .peers
                .get(&self.local)
                .map(|e| e.value().clone())
                .ok_or_else(|| {
                    TransportError::ConnectFailed(peer.clone(), "dialer not attached".into())
                })?;

            // The accepting side gets its mirror connection delivered as
            // an incoming-connection event.
            let back: Arc<dyn PeerConnection> = Arc::new(HubConnection {
                hub: self.hub.clone(),
                remote: self.local.clone(),
                sender: peer.clone(),
                deliver_to: local_tx,
            });
            let _ = remote_tx.send(EngineEvent::ConnectionOpened(back));

            Ok(Arc::new(HubConnection {
                hub: self.hub.clone(),
                remote: peer.clone(),
                sender: self.local.clone(),
                deliver_to: remote_tx,
            }) as Arc<dyn PeerConnection>)
        })
    }
}

/// One direction of a connection pair: frames sent here arrive as
/// `Inbound` events on the remote peer's channel, in send order.
pub struct HubConnection {
    hub: Arc<MemoryHub>,
    remote: PeerId,
    sender: PeerId,
    deliver_to: mpsc::UnboundedSender<EngineEvent>,
}

impl PeerConnection for HubConnection {
    fn peer_id(&self) -> &PeerId {
        &self.remote
    }

    fn send(&self, message: &Message) -> Result<(), TransportError> {
        self.hub.frames_sent.fetch_add(1, Ordering::AcqRel);
        let frame = message
            .encode()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.deliver_to
            .send(EngineEvent::Inbound {
                from: self.sender.clone(),
                frame,
            })
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        let _ = self
            .deliver_to
            .send(EngineEvent::ConnectionClosed(self.sender.clone()));
    }
}

// ── Test sink ─────────────────────────────────────────────────────────────────

/// Fake playback buffer. Accepted appends complete "later" via the sink
/// signal; play/pause/seek fire a playback event afterwards, exactly as
/// a driven video element would.
pub struct TestSink {
    signal: SinkSignal,
    open: AtomicBool,
    playing: AtomicBool,
    position: Mutex<f64>,
    appended: Mutex<Vec<Vec<u8>>>,
    eos_count: AtomicUsize,
    reject_remaining: AtomicUsize,
}

impl TestSink {
    fn new(signal: SinkSignal) -> Arc<Self> {
        Arc::new(Self {
            signal,
            open: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            position: Mutex::new(0.0),
            appended: Mutex::new(Vec::new()),
            eos_count: AtomicUsize::new(0),
            reject_remaining: AtomicUsize::new(0),
        })
    }

    pub fn appended(&self) -> Vec<Vec<u8>> {
        self.appended.lock().unwrap().clone()
    }

    pub fn append_count(&self) -> usize {
        self.appended.lock().unwrap().len()
    }

    pub fn eos_count(&self) -> usize {
        self.eos_count.load(Ordering::Acquire)
    }

    pub fn reject_next(&self, n: usize) {
        self.reject_remaining.store(n, Ordering::Release);
    }

    pub fn playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn position(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    /// Drive the sink like a user: seek, then start playback.
    pub fn user_seek_and_play(&self, seconds: f64) {
        self.set_position(seconds);
        self.play();
    }

    /// Simulate the buffer dying out from under the engine.
    pub fn force_close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl MediaSink for TestSink {
    fn append(&self, data: &[u8]) -> Result<(), SinkError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }
        let remaining = self.reject_remaining.load(Ordering::Acquire);
        if remaining > 0 {
            self.reject_remaining.store(remaining - 1, Ordering::Release);
            return Err(SinkError::Rejected("buffer refused append".into()));
        }
        self.appended.lock().unwrap().push(data.to_vec());
        self.signal.write_complete();
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn current_position(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    fn set_position(&self, seconds: f64) {
        *self.position.lock().unwrap() = seconds;
        self.signal.playback_event();
    }

    fn play(&self) {
        self.playing.store(true, Ordering::Release);
        self.signal.playback_event();
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::Release);
        self.signal.playback_event();
    }

    fn end_of_stream(&self) -> Result<(), SinkError> {
        self.eos_count.fetch_add(1, Ordering::AcqRel);
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn evict(&self, _from: f64, _to: f64) -> Result<(), SinkError> {
        Ok(())
    }
}

// ── Peers ─────────────────────────────────────────────────────────────────────

/// One running peer: its router task, transport, and every sink it has
/// created (resets append to the list; the last entry is current).
pub struct Peer {
    pub id: PeerId,
    pub handle: RouterHandle,
    pub transport: Arc<HubTransport>,
    pub sinks: Arc<Mutex<Vec<Arc<TestSink>>>>,
}

impl Peer {
    pub fn sink(&self) -> Arc<TestSink> {
        self.sinks.lock().unwrap().last().unwrap().clone()
    }

    pub fn sink_generation(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    /// Dial another peer out-of-band (the shared-locator bootstrap).
    pub async fn dial(&self, target: &str) -> anyhow::Result<()> {
        let conn = self
            .transport
            .connect(&PeerId::from(target))
            .await
            .map_err(anyhow::Error::from)?;
        self.handle
            .events
            .send(EngineEvent::ConnectionOpened(conn))
            .ok();
        Ok(())
    }
}

pub fn spawn_peer(hub: &Arc<MemoryHub>, id: &str, shutdown: &broadcast::Sender<()>) -> Peer {
    let sinks: Arc<Mutex<Vec<Arc<TestSink>>>> = Arc::new(Mutex::new(Vec::new()));
    let slot = sinks.clone();
    let factory: SinkFactory = Box::new(move |signal| {
        let sink = TestSink::new(signal);
        slot.lock().unwrap().push(sink.clone());
        sink as Arc<dyn MediaSink>
    });

    let transport = Arc::new(HubTransport {
        hub: hub.clone(),
        local: PeerId::from(id),
    });
    let (router, handle) = Router::new(
        transport.clone(),
        factory,
        test_stream_cfg(),
        shutdown.subscribe(),
    );
    hub.attach(PeerId::from(id), handle.events.clone());
    tokio::spawn(router.run());

    Peer {
        id: PeerId::from(id),
        handle,
        transport,
        sinks,
    }
}

/// Spin up a converged party of n peers: each new peer dials the first.
pub async fn spawn_party(
    hub: &Arc<MemoryHub>,
    ids: &[&str],
    shutdown: &broadcast::Sender<()>,
) -> Vec<Peer> {
    let peers: Vec<Peer> = ids.iter().map(|id| spawn_peer(hub, id, shutdown)).collect();
    for peer in &peers[1..] {
        peer.dial(ids[0]).await.unwrap();
    }
    let want = ids.len() - 1;
    assert!(
        wait_until(2000, || peers.iter().all(|p| p.handle.registry.len() == want)).await,
        "party of {} never converged to a full mesh",
        ids.len()
    );
    peers
}
