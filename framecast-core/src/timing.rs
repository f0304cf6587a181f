//! Per-frame timing samples and pipeline counters.
//!
//! The encode/transmit loop is the only writer. The reporting loop reads
//! concurrently, so the window lives behind a mutex in the session and
//! counters are atomics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Samples kept before compaction.
pub const TIMING_WINDOW_CAPACITY: usize = 100;

/// Samples kept after compaction.
pub const TIMING_WINDOW_RETAIN: usize = 50;

// ── TimingSample ─────────────────────────────────────────────────

/// Stage durations measured for one transmitted frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingSample {
    pub capture: Duration,
    pub encode: Duration,
    pub network: Duration,
}

impl TimingSample {
    pub fn new(capture: Duration, encode: Duration, network: Duration) -> Self {
        Self {
            capture,
            encode,
            network,
        }
    }

    /// Capture plus encode: the part of the frame time quality can affect.
    pub fn frame_time(&self) -> Duration {
        self.capture + self.encode
    }
}

// ── TimingWindow ─────────────────────────────────────────────────

/// Bounded trailing window of [`TimingSample`]s.
///
/// Holds at most `capacity` samples; recording one more compacts the
/// window down to the most recent `retain`.
#[derive(Debug, Clone)]
pub struct TimingWindow {
    samples: VecDeque<TimingSample>,
    capacity: usize,
    retain: usize,
}

impl TimingWindow {
    pub fn new() -> Self {
        Self::with_limits(TIMING_WINDOW_CAPACITY, TIMING_WINDOW_RETAIN)
    }

    /// `retain` is clamped to `capacity`.
    pub fn with_limits(capacity: usize, retain: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            retain: retain.min(capacity),
        }
    }

    pub fn record(&mut self, sample: TimingSample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            let excess = self.samples.len() - self.retain;
            self.samples.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&TimingSample> {
        self.samples.back()
    }

    /// Mean capture + encode time, zero when empty.
    pub fn average_frame_time(&self) -> Duration {
        self.average(|s| s.frame_time())
    }

    /// Mean network (send) time, zero when empty.
    pub fn average_network_time(&self) -> Duration {
        self.average(|s| s.network)
    }

    /// Frames per second the pipeline sustains given the window averages.
    pub fn effective_fps(&self) -> f64 {
        let per_frame = self.average_frame_time() + self.average_network_time();
        if per_frame.is_zero() {
            return 0.0;
        }
        1.0 / per_frame.as_secs_f64()
    }

    fn average(&self, f: impl Fn(&TimingSample) -> Duration) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().map(f).sum();
        total / self.samples.len() as u32
    }
}

impl Default for TimingWindow {
    fn default() -> Self {
        Self::new()
    }
}

// ── PipelineCounters ─────────────────────────────────────────────

/// Monotonic event counters for one sender session.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub captured: AtomicU64,
    pub capture_failures: AtomicU64,
    pub encode_failures: AtomicU64,
    pub sent: AtomicU64,
    pub bytes_sent: AtomicU64,
}

impl PipelineCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

// ── PerformanceReport ────────────────────────────────────────────

/// Point-in-time summary logged by the reporting loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceReport {
    pub frames_captured: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub capture_failures: u64,
    pub encode_failures: u64,
    pub bytes_sent: u64,
    pub quality: u8,
    pub avg_frame_time: Duration,
    pub avg_network_time: Duration,
    pub effective_fps: f64,
}

impl PerformanceReport {
    pub fn collect(counters: &PipelineCounters, window: &TimingWindow, dropped: u64, quality: u8) -> Self {
        Self {
            frames_captured: PipelineCounters::get(&counters.captured),
            frames_sent: PipelineCounters::get(&counters.sent),
            frames_dropped: dropped,
            capture_failures: PipelineCounters::get(&counters.capture_failures),
            encode_failures: PipelineCounters::get(&counters.encode_failures),
            bytes_sent: PipelineCounters::get(&counters.bytes_sent),
            quality,
            avg_frame_time: window.average_frame_time(),
            avg_network_time: window.average_network_time(),
            effective_fps: window.effective_fps(),
        }
    }
}

impl std::fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frame {:.1}ms, network {:.1}ms, {:.1} fps, quality {}, sent {}, dropped {}, failed {}",
            self.avg_frame_time.as_secs_f64() * 1000.0,
            self.avg_network_time.as_secs_f64() * 1000.0,
            self.effective_fps,
            self.quality,
            self.frames_sent,
            self.frames_dropped,
            self.capture_failures + self.encode_failures,
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn empty_window_averages_are_zero() {
        let window = TimingWindow::new();
        assert_eq!(window.average_frame_time(), Duration::ZERO);
        assert_eq!(window.effective_fps(), 0.0);
    }

    #[test]
    fn compacts_to_most_recent_half() {
        let mut window = TimingWindow::new();
        for i in 0..100u64 {
            window.record(TimingSample::new(ms(i), ms(0), ms(0)));
        }
        assert_eq!(window.len(), 100);

        window.record(TimingSample::new(ms(100), ms(0), ms(0)));
        assert_eq!(window.len(), 50);
        assert_eq!(window.latest().unwrap().capture, ms(100));
        // Oldest survivor is sample 51.
        assert_eq!(window.samples.front().unwrap().capture, ms(51));
    }

    #[test]
    fn averages_and_fps() {
        let mut window = TimingWindow::new();
        window.record(TimingSample::new(ms(10), ms(10), ms(5)));
        window.record(TimingSample::new(ms(20), ms(10), ms(15)));

        assert_eq!(window.average_frame_time(), ms(25));
        assert_eq!(window.average_network_time(), ms(10));
        assert!((window.effective_fps() - (1.0 / 0.035)).abs() < 1e-6);
    }

    #[test]
    fn report_display_is_one_line() {
        let counters = PipelineCounters::default();
        PipelineCounters::incr(&counters.sent);
        PipelineCounters::incr(&counters.encode_failures);
        let report = PerformanceReport::collect(&counters, &TimingWindow::new(), 3, 75);

        let text = report.to_string();
        assert!(text.contains("quality 75"));
        assert!(text.contains("dropped 3"));
        assert!(text.contains("failed 1"));
        assert!(!text.contains('\n'));
    }
}
