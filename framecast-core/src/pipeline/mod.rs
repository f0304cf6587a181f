//! Streaming sessions and their worker loops.
//!
//! ```text
//!  sender:   capture ──► FrameBuffer ──► encode/transmit ──► FrameWriter
//!                                           │      ▲
//!                                           ▼      │
//!                                    TimingWindow  QualityController
//!            report (reads counters, window, quality)
//!
//!  receiver: FrameReader ──► decode ──► FrameSink
//! ```
//!
//! Every loop is its own tokio task; blocking collaborator calls run on
//! the blocking pool.

mod capture;
mod receiver;
mod report;
mod sender;
mod transmit;

use std::future::Future;
use std::time::Duration;

use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::state::Lifecycle;

pub use receiver::{ReceiverSession, ReceiverStats};
pub use sender::SenderSession;

/// Default target frame rate.
pub const DEFAULT_TARGET_FPS: u32 = 30;

/// How long the encode stage waits on an empty buffer before re-checking
/// the lifecycle.
pub const DEFAULT_POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Default interval between performance reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

// ── StreamSettings ───────────────────────────────────────────────

/// Per-session knobs not covered by the platform profile.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub target_fps: u32,
    pub buffer_capacity: usize,
    pub pop_timeout: Duration,
    pub report_interval: Duration,
    /// Adaptive quality on/off. Also forced off when the encoder has no
    /// quality range.
    pub adaptive: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            pop_timeout: DEFAULT_POP_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
            adaptive: true,
        }
    }
}

impl StreamSettings {
    /// `1 / target_fps`.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

// ── SessionOutcome ───────────────────────────────────────────────

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Shutdown was requested.
    Stopped,
    /// The transport failed or the peer closed the stream.
    ConnectionLost { reason: String },
    /// A worker task failed or panicked.
    Failed { reason: String },
}

impl SessionOutcome {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::ConnectionLost { reason } => write!(f, "connection lost: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Run a worker, stopping the session if it exits with an error so the
/// other loops do not keep running without it.
async fn supervised<F>(lifecycle: Lifecycle, worker: F) -> crate::Result<SessionOutcome>
where
    F: Future<Output = crate::Result<SessionOutcome>>,
{
    let result = worker.await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "worker failed, stopping session");
        lifecycle.request_stop();
    }
    result
}

/// Fold a worker's join result into the outcome of the whole session.
/// The first non-`Stopped` outcome wins.
fn merge_outcome(
    current: SessionOutcome,
    joined: Result<crate::Result<SessionOutcome>, tokio::task::JoinError>,
) -> SessionOutcome {
    let next = match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => SessionOutcome::Failed {
            reason: e.to_string(),
        },
        Err(e) => SessionOutcome::Failed {
            reason: e.to_string(),
        },
    };
    match current {
        SessionOutcome::Stopped => next,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_one_over_fps() {
        let settings = StreamSettings::default();
        assert_eq!(settings.frame_interval(), Duration::from_secs(1) / 30);
    }

    #[test]
    fn first_failure_wins() {
        let lost = SessionOutcome::ConnectionLost {
            reason: "reset".into(),
        };
        let merged = merge_outcome(SessionOutcome::Stopped, Ok(Ok(lost.clone())));
        assert_eq!(merged, lost);
        let merged = merge_outcome(merged, Ok(Ok(SessionOutcome::Stopped)));
        assert_eq!(merged, lost);
    }

    #[test]
    fn outcome_display() {
        let lost = SessionOutcome::ConnectionLost {
            reason: "end of stream".into(),
        };
        assert_eq!(lost.to_string(), "connection lost: end of stream");
        assert!(lost.is_connection_lost());
    }
}
