//! Playback-state reconciliation — one shared value, no central
//! authority.
//!
//! The reconciler holds the single authoritative local copy of the
//! shared [`PlaybackState`]. Local playback events become broadcasts
//! only when they actually change the value; remote snapshots are
//! applied to the sink only when they differ. That one equality check
//! is the entire loop-suppression mechanism: applying a remote state
//! makes the sink fire a local playback event, but by then the event
//! reads back a state equal to `current` and dies here.
//!
//! Two peers acting at nearly the same time race: whichever snapshot a
//! given peer receives last wins there, in true delivery order. The
//! protocol deliberately has no tie-break.

use matinee_core::PlaybackState;

use crate::sink::MediaSink;

pub struct Reconciler {
    current: PlaybackState,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            current: PlaybackState::default(),
        }
    }

    pub fn current(&self) -> PlaybackState {
        self.current
    }

    /// A play/pause/seek settled on the local sink. Returns the state
    /// to broadcast, or `None` when the sink merely echoed a state we
    /// already hold.
    pub fn local_event(&mut self, sink: &dyn MediaSink) -> Option<PlaybackState> {
        let next = PlaybackState {
            playing: sink.is_playing(),
            position: sink.current_position(),
        };
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(next)
    }

    /// A snapshot arrived from a peer. Applies it to the sink and
    /// returns true, or returns false without touching the sink when it
    /// equals the current state.
    pub fn apply_remote(&mut self, state: PlaybackState, sink: &dyn MediaSink) -> bool {
        if state == self.current {
            return false;
        }
        self.current = state;

        sink.set_position(state.position);
        // Only drive transitions; redundant play/pause calls would fire
        // extra playback events for nothing.
        if sink.is_playing() && !state.playing {
            sink.pause();
        }
        if !sink.is_playing() && state.playing {
            sink.play();
        }
        true
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
