use crate::*;

use std::time::Duration;

use matinee_core::{Message, PeerId};
use matinee_sync::EngineEvent;
use tokio::sync::broadcast;

/// Play on one peer reaches every other peer's sink.
#[tokio::test]
async fn test_playback_play_propagates() {
    init_tracing();
    let hub = MemoryHub::new();
    let (shutdown, _) = broadcast::channel(1);

    let peers = spawn_party(&hub, &["alpha", "bravo", "charlie"], &shutdown).await;

    peers[0].sink().play();
    assert!(
        wait_until(2000, || peers[1].sink().playing() && peers[2].sink().playing()).await,
        "play never reached the other peers"
    );
}

/// Seek-and-play from one peer lands position and transport state on a
/// late-acting peer, and a follow-up pause from a different peer wins.
#[tokio::test]
async fn test_playback_seek_then_pause_across_peers() {
    init_tracing();
    let hub = MemoryHub::new();
    let (shutdown, _) = broadcast::channel(1);

    let peers = spawn_party(&hub, &["alpha", "bravo"], &shutdown).await;

    peers[0].sink().user_seek_and_play(42.5);
    assert!(wait_until(2000, || peers[1].sink().playing()).await);
    assert_eq!(peers[1].sink().position(), 42.5);

    // bravo pauses; alpha must follow.
    peers[1].sink().pause();
    assert!(
        wait_until(2000, || !peers[0].sink().playing()).await,
        "pause from the second peer never came back"
    );
    assert_eq!(peers[0].sink().position(), 42.5);
}

/// Applying a remote state makes the receiving sink fire local playback
/// events; those echoes must not produce another broadcast. After one
/// change settles, the wire goes quiet.
#[tokio::test]
async fn test_playback_no_echo_storm() {
    init_tracing();
    let hub = MemoryHub::new();
    let (shutdown, _) = broadcast::channel(1);

    let peers = spawn_party(&hub, &["alpha", "bravo", "charlie"], &shutdown).await;

    peers[0].sink().user_seek_and_play(7.0);
    assert!(
        wait_until(2000, || {
            peers[1].sink().playing() && peers[2].sink().playing()
        })
        .await
    );

    // Give any echo a full round to manifest, then demand silence.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = hub.frames_sent();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        hub.frames_sent(),
        settled,
        "peers kept re-broadcasting an already-shared state"
    );
    assert!(peers[0].sink().playing());
}

/// A state snapshot equal to what a peer already holds is ignored
/// without touching its sink.
#[tokio::test]
async fn test_playback_redundant_state_not_reapplied() {
    init_tracing();
    let hub = MemoryHub::new();
    let (shutdown, _) = broadcast::channel(1);

    let peers = spawn_party(&hub, &["alpha", "bravo"], &shutdown).await;

    peers[0].sink().user_seek_and_play(5.0);
    assert!(wait_until(2000, || peers[1].sink().playing()).await);

    // Re-deliver the identical snapshot by hand.
    let state = matinee_core::PlaybackState {
        playing: true,
        position: 5.0,
    };
    let frame = Message::State(state).encode().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let before = hub.frames_sent();
    peers[1]
        .handle
        .events
        .send(EngineEvent::Inbound {
            from: PeerId::from("alpha"),
            frame,
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hub.frames_sent(), before, "redundant state was rebroadcast");
    assert!(peers[1].sink().playing());
    assert_eq!(peers[1].sink().position(), 5.0);
}
