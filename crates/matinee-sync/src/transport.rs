//! Transport capability — the seam between the engine and whatever
//! provides reliable point-to-point connections (WebRTC data channels,
//! TCP in tests, anything with ordered delivery per connection).
//!
//! Intentionally minimal. Connection establishment, signaling, and
//! reconnection policy are the provider's business; the engine only
//! dials, sends, and reacts to the events the provider feeds into its
//! channel.

use std::sync::Arc;

use futures::future::BoxFuture;
use matinee_core::{Message, PeerId};

/// One live logical channel to a peer. Owned by the connection registry
/// for its lifetime.
pub trait PeerConnection: Send + Sync {
    /// The remote peer this connection reaches.
    fn peer_id(&self) -> &PeerId;

    /// Send one message. Per-connection ordering is the provider's
    /// guarantee; failures are reported, never retried at this layer.
    fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Close the channel. The provider must follow up with a
    /// `ConnectionClosed` event on both ends.
    fn close(&self);
}

/// The connection provider.
pub trait Transport: Send + Sync {
    /// This peer's transport-assigned identity.
    fn local_id(&self) -> &PeerId;

    /// Open an outbound connection. A failure is always non-fatal to
    /// the mesh: the advertised peer may simply be gone already, and
    /// the mesh self-heals on the next advertisement.
    fn connect<'a>(
        &'a self,
        peer: &'a PeerId,
    ) -> BoxFuture<'a, Result<Arc<dyn PeerConnection>, TransportError>>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {0} failed: {1}")]
    ConnectFailed(PeerId, String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("connection closed")]
    Closed,
}
