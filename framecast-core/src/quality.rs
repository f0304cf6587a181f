//! Adaptive quality control.
//!
//! Once per transmitted frame the controller compares capture + encode
//! time against the target frame interval:
//!
//! ```text
//!   total > 1.2 × target   →  quality -= step        (floor: min)
//!   total < 0.8 × target   →  quality += step / 2    (cap:   max)
//!   otherwise              →  unchanged
//! ```
//!
//! Network time is not part of `total`; quality cannot shorten it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::timing::TimingSample;

// ── QualityState ─────────────────────────────────────────────────

/// The current encoder quality, shared between the encode stage (writer)
/// and the reporting loop (reader).
#[derive(Debug)]
pub struct QualityState(AtomicU8);

impl QualityState {
    pub fn new(initial: u8) -> Self {
        Self(AtomicU8::new(initial))
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, quality: u8) {
        self.0.store(quality, Ordering::Relaxed);
    }
}

// ── QualityController ────────────────────────────────────────────

/// What the controller did with one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Decreased,
    Increased,
    Unchanged,
}

/// Hysteresis controller over a fixed quality range.
#[derive(Debug, Clone)]
pub struct QualityController {
    step: u8,
    min: u8,
    max: u8,
    target_interval: Duration,
    enabled: bool,
}

impl QualityController {
    /// `min > max` is normalised by swapping.
    pub fn new(target_interval: Duration, step: u8, min: u8, max: u8) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            step,
            min,
            max,
            target_interval,
            enabled: true,
        }
    }

    /// Controller for a target frame rate. `fps` of zero is treated as one.
    pub fn for_fps(fps: u32, step: u8, min: u8, max: u8) -> Self {
        Self::new(Duration::from_secs(1) / fps.max(1), step, min, max)
    }

    /// Disable or enable adaptation. A disabled controller never changes
    /// quality.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn target_interval(&self) -> Duration {
        self.target_interval
    }

    /// Clamp `quality` into the controller's range.
    pub fn clamp(&self, quality: u8) -> u8 {
        quality.clamp(self.min, self.max)
    }

    /// Quality for the next encode given the current value and the last
    /// sample.
    pub fn next_quality(&self, current: u8, sample: &TimingSample) -> (u8, Adjustment) {
        if !self.enabled {
            return (current, Adjustment::Unchanged);
        }

        // Compare in integer nanoseconds: total * 5 vs target * 6 (or * 4).
        let total = sample.frame_time().as_nanos();
        let target = self.target_interval.as_nanos();

        if total * 5 > target * 6 {
            let next = current.saturating_sub(self.step).max(self.min);
            (next, Adjustment::Decreased)
        } else if total * 5 < target * 4 {
            let half_step = (self.step / 2).max(1);
            let next = current.saturating_add(half_step).min(self.max);
            (next, Adjustment::Increased)
        } else {
            (current, Adjustment::Unchanged)
        }
    }

    /// Feed one sample and update `state` in place.
    pub fn apply(&self, state: &QualityState, sample: &TimingSample) -> Adjustment {
        let current = state.get();
        let (next, adjustment) = self.next_quality(current, sample);
        if next != current {
            tracing::debug!(from = current, to = next, ?adjustment, "quality adjusted");
            state.set(next);
        }
        adjustment
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Duration = Duration::from_millis(100);

    fn controller() -> QualityController {
        QualityController::new(TARGET, 5, 30, 90)
    }

    fn sample(total_ms: u64) -> TimingSample {
        TimingSample::new(
            Duration::from_millis(total_ms / 2),
            Duration::from_millis(total_ms - total_ms / 2),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn slow_frames_decrease_by_step() {
        let (q, adj) = controller().next_quality(75, &sample(200));
        assert_eq!((q, adj), (70, Adjustment::Decreased));
    }

    #[test]
    fn fast_frames_increase_by_half_step() {
        let (q, adj) = controller().next_quality(75, &sample(10));
        assert_eq!((q, adj), (77, Adjustment::Increased));
    }

    #[test]
    fn hysteresis_band_is_unchanged() {
        let c = controller();
        for total in [80, 100, 120] {
            assert_eq!(c.next_quality(60, &sample(total)), (60, Adjustment::Unchanged));
        }
    }

    #[test]
    fn network_time_is_ignored() {
        // 90ms capture+encode with a 5s network time stays in the band.
        assert_eq!(controller().next_quality(50, &sample(90)).1, Adjustment::Unchanged);
    }

    #[test]
    fn never_below_min() {
        let c = controller();
        let state = QualityState::new(75);
        for _ in 0..50 {
            c.apply(&state, &sample(500));
            assert!(state.get() >= 30);
        }
        assert_eq!(state.get(), 30);
    }

    #[test]
    fn never_above_max() {
        let c = controller();
        let state = QualityState::new(31);
        for _ in 0..100 {
            c.apply(&state, &sample(1));
            assert!(state.get() <= 90);
        }
        assert_eq!(state.get(), 90);
    }

    #[test]
    fn five_slow_frames_from_default() {
        let c = controller();
        let mut q = 75;
        for _ in 0..5 {
            q = c.next_quality(q, &sample(200)).0;
        }
        assert_eq!(q, 50);
    }

    #[test]
    fn one_point_step_still_increases() {
        let c = QualityController::new(TARGET, 1, 10, 20);
        assert_eq!(c.next_quality(10, &sample(1)).0, 11);
    }

    #[test]
    fn disabled_controller_holds_quality() {
        let c = controller().with_enabled(false);
        assert_eq!(c.next_quality(75, &sample(500)), (75, Adjustment::Unchanged));
    }

    #[test]
    fn fps_sets_target_interval() {
        let c = QualityController::for_fps(20, 5, 30, 90);
        assert_eq!(c.target_interval(), Duration::from_millis(50));
        assert_eq!(QualityController::for_fps(0, 5, 30, 90).target_interval(), Duration::from_secs(1));
    }
}
