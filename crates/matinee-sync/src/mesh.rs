//! Mesh membership — full-mesh convergence by eager advertisement.
//!
//! Every new edge carries one advertisement of the sender's current
//! peer list; the receiver dials anyone it does not know. There is no
//! periodic re-sync — convergence rests entirely on every peer
//! advertising on every new connection.

use std::sync::Arc;

use matinee_core::{Message, PeerId};
use tokio::sync::mpsc;

use crate::event::EngineEvent;
use crate::registry::ConnectionRegistry;
use crate::transport::Transport;

/// The advertisement sent to a peer whose connection just opened.
///
/// Snapshot of the registry at send time; the new peer itself is not
/// yet registered, so the list never includes the recipient.
pub fn advertisement(registry: &ConnectionRegistry) -> Message {
    Message::Membership {
        peers: registry.peer_ids(),
    }
}

/// Process a received advertisement: dial every listed peer we are not
/// already connected to. Idempotent — duplicates within the list, ids
/// already in the registry, and our own id are silently skipped.
///
/// Each dial runs as a spawned task, never inline: signaling latency is
/// a wait like any other, and the engine loop must keep consuming while
/// it runs. A successful dial re-enters the loop as a
/// `ConnectionOpened` event so the router registers the connection and
/// advertises in turn. Dial failures are expected (the advertised peer
/// may already be gone) and non-fatal; the mesh self-heals on the next
/// advertisement from a common neighbor.
///
/// Returns how many dials were started.
pub fn handle_advertisement(
    peers: Vec<PeerId>,
    local_id: &PeerId,
    registry: &ConnectionRegistry,
    transport: &Arc<dyn Transport>,
    events: &mpsc::UnboundedSender<EngineEvent>,
) -> usize {
    let mut dialed = std::collections::HashSet::new();
    let mut started = 0;

    for peer in peers {
        if peer == *local_id || registry.contains(&peer) || !dialed.insert(peer.clone()) {
            continue;
        }
        started += 1;
        let transport = transport.clone();
        let events = events.clone();
        tokio::spawn(async move {
            match transport.connect(&peer).await {
                Ok(connection) => {
                    let _ = events.send(EngineEvent::ConnectionOpened(connection));
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "dial from advertisement failed");
                }
            }
        });
    }

    started
}
