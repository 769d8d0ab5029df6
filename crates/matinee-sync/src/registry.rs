//! Connection registry — the live full-mesh edge set, keyed by peer id.
//!
//! Shared between the router and any presentation collaborator; the
//! roster watch channel publishes the sorted peer list on every change
//! so a peer-list display can re-render without polling.

use std::sync::Arc;

use dashmap::DashMap;
use matinee_core::{Message, PeerId};
use tokio::sync::watch;

use crate::transport::PeerConnection;

#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<PeerId, Arc<dyn PeerConnection>>>,
    roster: Arc<watch::Sender<Vec<PeerId>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (roster, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(DashMap::new()),
            roster: Arc::new(roster),
        }
    }

    /// Register a freshly opened connection. A prior entry under the
    /// same peer id is replaced — this only happens on a genuinely new
    /// open, and two channels to one peer are never merged.
    pub fn add(&self, connection: Arc<dyn PeerConnection>) {
        let peer = connection.peer_id().clone();
        self.inner.insert(peer, connection);
        self.publish_roster();
    }

    pub fn remove(&self, peer: &PeerId) -> Option<Arc<dyn PeerConnection>> {
        let removed = self.inner.remove(peer).map(|(_, conn)| conn);
        if removed.is_some() {
            self.publish_roster();
        }
        removed
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.inner.contains_key(peer)
    }

    /// Sorted snapshot of connected peer ids.
    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.inner.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Snapshot of all live connections.
    pub fn connections(&self) -> Vec<(PeerId, Arc<dyn PeerConnection>)> {
        self.inner
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Observe roster changes (for a peer-list display).
    pub fn subscribe(&self) -> watch::Receiver<Vec<PeerId>> {
        self.roster.subscribe()
    }

    /// Send one message to every connected peer. Per-peer failures are
    /// logged and skipped — a dying connection will surface through its
    /// own close event.
    pub fn broadcast(&self, message: &Message) {
        for entry in self.inner.iter() {
            if let Err(e) = entry.value().send(message) {
                tracing::warn!(peer = %entry.key(), error = %e, "broadcast send failed");
            }
        }
    }

    fn publish_roster(&self) {
        let _ = self.roster.send(self.peer_ids());
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
