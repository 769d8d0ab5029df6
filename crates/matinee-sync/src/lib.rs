//! matinee-sync — lockstep playback over a full peer mesh.
//!
//! One peer supplies media, every peer sees the same play/pause/seek
//! position, and new peers join by dialing any existing member. The
//! crate is a library: the embedding player supplies a [`Transport`]
//! for point-to-point messaging and a [`MediaSink`] for the local
//! playback buffer, and drives everything else through the
//! [`Router`]'s event channel.
//!
//! All engine state is mutated by one consumer loop; concurrency is
//! event scheduling (spawned sleeps that feed events back into the
//! channel), never parallel writers.

pub mod event;
pub mod mesh;
pub mod reconcile;
pub mod registry;
pub mod router;
pub mod sink;
pub mod source;
pub mod stream;
pub mod transport;

pub use event::EngineEvent;
pub use registry::ConnectionRegistry;
pub use router::{Router, RouterHandle};
pub use sink::{MediaSink, SinkError, SinkFactory, SinkSignal};
pub use transport::{PeerConnection, Transport, TransportError};
