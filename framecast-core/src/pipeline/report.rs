//! Low-frequency reporting loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::error::Result;

use super::SessionOutcome;
use super::sender::SenderShared;

pub(super) async fn run(shared: Arc<SenderShared>, interval: Duration) -> Result<SessionOutcome> {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(100)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = shared.report();
                tracing::info!(
                    fps = report.effective_fps,
                    quality = report.quality,
                    sent = report.frames_sent,
                    dropped = report.frames_dropped,
                    "performance: {report}"
                );
            }
            _ = shared.lifecycle.stopping() => break,
        }
    }

    tracing::info!("final performance: {}", shared.report());
    Ok(SessionOutcome::Stopped)
}
