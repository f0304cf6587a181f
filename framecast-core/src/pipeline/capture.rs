//! Capture loop: paces the frame source and feeds the buffer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::PushOutcome;
use crate::error::Result;
use crate::source::FrameSource;
use crate::timing::PipelineCounters;

use super::SessionOutcome;
use super::sender::SenderShared;

/// Runs until the lifecycle leaves `Streaming`.
///
/// Capture failures are logged and skipped. Each iteration sleeps for
/// `max(min_sleep, interval - capture_time)`.
pub(super) async fn run<S: FrameSource>(
    mut source: S,
    shared: Arc<SenderShared>,
    interval: Duration,
    min_sleep: Duration,
) -> Result<SessionOutcome> {
    let mut sequence = 0u64;
    tracing::debug!(?interval, "capture loop started");

    while shared.lifecycle.is_streaming() {
        let started = Instant::now();
        let (returned, captured) = tokio::task::spawn_blocking(move || {
            let captured = source.capture();
            (source, captured)
        })
        .await?;
        source = returned;
        let capture_duration = started.elapsed();

        match captured {
            Ok(mut frame) => {
                frame.captured_at = started;
                frame.capture_duration = capture_duration;
                frame.sequence = sequence;
                PipelineCounters::incr(&shared.counters.captured);
                if shared.buffer.try_push(frame) == PushOutcome::Dropped {
                    tracing::trace!(sequence, "buffer full, frame dropped");
                }
                sequence += 1;
            }
            Err(e) => {
                PipelineCounters::incr(&shared.counters.capture_failures);
                tracing::warn!(error = %e, "capture failed");
            }
        }

        let pause = interval.saturating_sub(capture_duration).max(min_sleep);
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shared.lifecycle.stopping() => break,
        }
    }

    tracing::debug!(frames = sequence, "capture loop exited");
    Ok(SessionOutcome::Stopped)
}

// ── Tests ────────────────────────────────────────────────────────
