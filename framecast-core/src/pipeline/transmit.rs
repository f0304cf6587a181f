//! Encode-and-transmit loop: drains the buffer, encodes at the current
//! quality, writes envelopes and feeds the quality controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;

use crate::buffer::PopOutcome;
use crate::error::Result;
use crate::quality::QualityController;
use crate::source::FrameEncoder;
use crate::timing::{PipelineCounters, TimingSample};
use crate::transport::FrameWriter;

use super::SessionOutcome;
use super::sender::SenderShared;

/// Runs until the lifecycle leaves `Streaming` or a send fails.
///
/// The writer is owned here and dropped on exit, which closes the
/// connection. A send failure stops the whole session.
pub(super) async fn run<E, W>(
    encoder: Arc<E>,
    mut writer: FrameWriter<W>,
    shared: Arc<SenderShared>,
    controller: QualityController,
    pop_timeout: Duration,
) -> Result<SessionOutcome>
where
    E: FrameEncoder + ?Sized,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tracing::debug!("transmit loop started");

    while shared.lifecycle.is_streaming() {
        let frame = match shared.buffer.pop(pop_timeout).await {
            PopOutcome::Frame(frame) => frame,
            PopOutcome::Timeout => continue,
            PopOutcome::Closed => break,
        };

        let sequence = frame.sequence;
        let capture = frame.capture_duration;
        let quality = shared.quality.get();

        let started = Instant::now();
        let enc = Arc::clone(&encoder);
        let encoded = tokio::task::spawn_blocking(move || enc.encode(&frame, quality)).await?;
        let encode = started.elapsed();

        let payload = match encoded {
            Ok(payload) => payload,
            Err(e) => {
                PipelineCounters::incr(&shared.counters.encode_failures);
                tracing::warn!(sequence, error = %e, "encode failed, frame skipped");
                continue;
            }
        };

        let len = payload.len();
        let sent_at = Instant::now();
        if let Err(e) = writer.send(payload).await {
            tracing::error!(sequence, error = %e, "send failed, stopping pipeline");
            shared.lifecycle.request_stop();
            shared.buffer.close();
            return Ok(SessionOutcome::ConnectionLost {
                reason: e.to_string(),
            });
        }
        let network = sent_at.elapsed();

        let sample = TimingSample::new(capture, encode, network);
        controller.apply(&shared.quality, &sample);
        shared.timing.lock().record(sample);

        PipelineCounters::add(&shared.counters.bytes_sent, len as u64);
        PipelineCounters::incr(&shared.counters.sent);

        tracing::trace!(sequence, quality, bytes = len, ?encode, ?network, "frame sent");
    }

    tracing::debug!(sent = writer.envelopes_sent(), "transmit loop exited");
    Ok(SessionOutcome::Stopped)
}
