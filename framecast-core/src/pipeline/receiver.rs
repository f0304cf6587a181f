//! Server-role session: one receive loop per accepted connection.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::source::{FrameDecoder, FrameSink};
use crate::state::{Lifecycle, PipelineState};
use crate::transport::FrameReader;

use super::{SessionOutcome, merge_outcome, supervised};

/// Smoothing factor for the received-FPS moving average.
const FPS_ALPHA: f64 = 0.1;

// ── ReceiverStats ────────────────────────────────────────────────

/// Counters published by the receive loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverStats {
    /// Frames decoded and presented.
    pub frames: u64,
    /// Payload bytes received, prefixes excluded.
    pub bytes: u64,
    pub decode_failures: u64,
    /// Zero-length envelopes the decoder rejected (skipped).
    pub empty_envelopes: u64,
    /// Exponentially smoothed frames per second.
    pub fps: f64,
}

// ── ReceiverSession ──────────────────────────────────────────────

/// A running receive loop.
pub struct ReceiverSession {
    lifecycle: Lifecycle,
    stats: watch::Receiver<ReceiverStats>,
    task: tokio::sync::Mutex<Option<JoinHandle<Result<SessionOutcome>>>>,
    outcome: Mutex<Option<SessionOutcome>>,
}

impl ReceiverSession {
    /// Start receiving from `reader` into `sink`.
    pub fn start<R, D, K>(reader: FrameReader<R>, decoder: Arc<D>, sink: K) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        D: FrameDecoder + ?Sized,
        K: FrameSink,
    {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_connect()?;
        lifecycle.begin_streaming()?;

        let (stats_tx, stats) = watch::channel(ReceiverStats::default());
        let task = tokio::spawn(supervised(
            lifecycle.clone(),
            run(reader, decoder, sink, lifecycle.clone(), stats_tx),
        ));

        Ok(Self {
            lifecycle,
            stats,
            task: tokio::sync::Mutex::new(Some(task)),
            outcome: Mutex::new(None),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.lifecycle.current()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Latest statistics snapshot.
    pub fn stats(&self) -> ReceiverStats {
        self.stats.borrow().clone()
    }

    /// Receiver for statistics updates.
    pub fn subscribe_stats(&self) -> watch::Receiver<ReceiverStats> {
        self.stats.clone()
    }

    pub fn stop(&self) {
        self.lifecycle.request_stop();
    }

    /// Resolves once the connection is lost or a stop is requested.
    pub async fn wait(&self) -> SessionOutcome {
        self.lifecycle.stopping().await;
        self.shutdown().await
    }

    /// Stop the loop and release the connection. Idempotent and safe to
    /// cancel: the handle is cleared only once the join completes.
    pub async fn shutdown(&self) -> SessionOutcome {
        let mut task = self.task.lock().await;
        let Some(running) = task.as_mut() else {
            return self
                .outcome
                .lock()
                .clone()
                .unwrap_or(SessionOutcome::Stopped);
        };

        self.lifecycle.request_stop();
        let joined = running.await;
        *task = None;
        let outcome = merge_outcome(SessionOutcome::Stopped, joined);
        self.lifecycle.finish_stop();

        tracing::info!(%outcome, frames = self.stats.borrow().frames, "receive session ended");
        *self.outcome.lock() = Some(outcome.clone());
        outcome
    }
}

// ── Receive loop ─────────────────────────────────────────────────

async fn run<R, D, K>(
    mut reader: FrameReader<R>,
    decoder: Arc<D>,
    mut sink: K,
    lifecycle: Lifecycle,
    stats: watch::Sender<ReceiverStats>,
) -> Result<SessionOutcome>
where
    R: AsyncRead + Unpin + Send + 'static,
    D: FrameDecoder + ?Sized,
    K: FrameSink,
{
    let mut last_frame: Option<Instant> = None;
    tracing::debug!("receive loop started");

    let outcome = loop {
        if !lifecycle.is_streaming() {
            break SessionOutcome::Stopped;
        }

        let received = tokio::select! {
            received = reader.receive() => received,
            _ = lifecycle.stopping() => break SessionOutcome::Stopped,
        };

        let payload = match received {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::info!("peer closed the stream");
                break SessionOutcome::ConnectionLost {
                    reason: "end of stream".into(),
                };
            }
            Err(e) => {
                tracing::error!(error = %e, "receive failed");
                break SessionOutcome::ConnectionLost {
                    reason: e.to_string(),
                };
            }
        };

        let len = payload.len() as u64;
        let dec = Arc::clone(&decoder);
        let (returned, decoded) = tokio::task::spawn_blocking(move || match dec.decode(&payload) {
            Ok(frame) => {
                sink.present(frame);
                (sink, Ok(()))
            }
            Err(e) => (sink, Err(e)),
        })
        .await?;
        sink = returned;

        match decoded {
            Ok(()) => {
                let now = Instant::now();
                let instant_fps = last_frame
                    .map(|prev| now.duration_since(prev).as_secs_f64())
                    .filter(|dt| *dt > 0.0)
                    .map(|dt| 1.0 / dt);
                last_frame = Some(now);

                stats.send_modify(|s| {
                    s.frames += 1;
                    s.bytes += len;
                    if let Some(fps) = instant_fps {
                        s.fps = if s.fps == 0.0 {
                            fps
                        } else {
                            s.fps * (1.0 - FPS_ALPHA) + fps * FPS_ALPHA
                        };
                    }
                });
            }
            Err(_) if len == 0 => {
                stats.send_modify(|s| s.empty_envelopes += 1);
                tracing::trace!("empty envelope skipped");
            }
            Err(e) => {
                stats.send_modify(|s| {
                    s.decode_failures += 1;
                    s.bytes += len;
                });
                tracing::warn!(bytes = len, error = %e, "decode failed, frame skipped");
            }
        }
    };

    lifecycle.request_stop();
    tracing::debug!(%outcome, "receive loop exited");
    Ok(outcome)
}
