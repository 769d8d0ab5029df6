//! matinee-core — wire format, message schema, and configuration.
//! All other matinee crates depend on this one.

pub mod config;
pub mod message;
pub mod wire;

pub use message::{Message, PeerId, PlaybackState};
