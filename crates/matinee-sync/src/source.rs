//! Local media source — reads a file in fixed slices and feeds them to
//! the engine, throttled by the delivery queue's depth.
//!
//! Reading is effectively unbounded-rate while the sink drains at
//! playback speed, so the producer suspends whenever the queue holds a
//! full lookahead window and re-checks after a fixed delay. This is the
//! system's only back-pressure mechanism.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use matinee_core::config::StreamConfig;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::event::EngineEvent;

/// Stream `path` into the engine as `LocalChunk` events, one
/// `chunk_size` slice per event, ending with `SourceFinished`.
///
/// `depth` is the stream engine's queue gauge: while it reports at
/// least `queue_window` pending entries, reading pauses.
pub async fn stream_file(
    path: PathBuf,
    cfg: StreamConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
    depth: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("failed to open media source: {}", path.display()))?;
    let mut reader = tokio::io::BufReader::new(file);
    let mut buf = vec![0u8; cfg.chunk_size];
    let mut total = 0u64;

    loop {
        while depth.load(Ordering::Acquire) >= cfg.queue_window {
            tokio::time::sleep(Duration::from_millis(cfg.producer_poll_ms)).await;
        }

        // Fill a whole slice where the file allows; the final slice is
        // whatever remains.
        let mut filled = 0;
        while filled < buf.len() {
            let n = reader
                .read(&mut buf[filled..])
                .await
                .context("reading media source failed")?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        total += filled as u64;

        let chunk = Bytes::copy_from_slice(&buf[..filled]);
        if events.send(EngineEvent::LocalChunk(chunk)).is_err() {
            // Engine is gone; nothing left to stream for.
            return Ok(());
        }
        // Let the engine ingest before the next depth check; buffered
        // reads rarely await, so the gauge would otherwise lag.
        tokio::task::yield_now().await;
    }

    tracing::info!(path = %path.display(), bytes = total, "local source fully read");
    let _ = events.send(EngineEvent::SourceFinished);
    Ok(())
}
