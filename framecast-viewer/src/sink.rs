//! Frame sinks for the headless viewer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use framecast_core::{FrameEncoder, FrameSink, JpegCodec, RawFrame};

use crate::config::{DisplayConfig, SinkKind};

/// Build the sink selected by `display.sink`.
pub fn build_sink(display: &DisplayConfig) -> Box<dyn FrameSink> {
    match display.sink {
        SinkKind::Snapshot => Box::new(SnapshotSink::new(
            display.snapshot_path.clone(),
            Duration::from_millis(display.snapshot_interval_ms),
            display.snapshot_quality,
        )),
        SinkKind::Null => Box::new(NullSink::new()),
    }
}

// ── SnapshotSink ─────────────────────────────────────────────────

/// Writes the most recent frame to a JPEG file, at most once per
/// `interval`. The first frame is always written.
///
/// Files are written to a sibling temp path and renamed into place so a
/// reader never sees a half-written image.
pub struct SnapshotSink {
    path: PathBuf,
    interval: Duration,
    quality: u8,
    codec: JpegCodec,
    last_written: Option<Instant>,
    written: Arc<AtomicU64>,
}

impl SnapshotSink {
    pub fn new(path: PathBuf, interval: Duration, quality: u8) -> Self {
        Self {
            path,
            interval,
            quality: quality.clamp(1, 100),
            codec: JpegCodec::new(),
            last_written: None,
            written: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared count of snapshots written so far.
    pub fn written_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.written)
    }

    fn due(&self, now: Instant) -> bool {
        self.last_written
            .is_none_or(|last| now.duration_since(last) >= self.interval)
    }

    fn write(&self, frame: &RawFrame) -> Result<usize, String> {
        let jpeg = self
            .codec
            .encode(frame, self.quality)
            .map_err(|e| e.to_string())?;
        let tmp = self.path.with_extension("jpg.tmp");
        std::fs::write(&tmp, &jpeg).map_err(|e| format!("{}: {e}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| format!("{}: {e}", self.path.display()))?;
        Ok(jpeg.len())
    }
}

impl FrameSink for SnapshotSink {
    fn present(&mut self, frame: RawFrame) {
        let now = Instant::now();
        if !self.due(now) {
            return;
        }
        match self.write(&frame) {
            Ok(bytes) => {
                self.last_written = Some(now);
                self.written.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    path = %self.path.display(),
                    sequence = frame.sequence,
                    bytes,
                    "snapshot written"
                );
            }
            Err(e) => tracing::warn!("snapshot failed: {e}"),
        }
    }
}

// ── NullSink ─────────────────────────────────────────────────────

/// Discards frames, counting them.
#[derive(Debug, Default)]
pub struct NullSink {
    frames: Arc<AtomicU64>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames)
    }
}

impl FrameSink for NullSink {
    fn present(&mut self, _frame: RawFrame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_core::{FrameDecoder, PixelFormat};

    fn frame(width: u32, height: u32) -> RawFrame {
        let data = vec![0x80; (width * height * 3) as usize];
        RawFrame::new(width, height, PixelFormat::Rgb8, data)
    }

    #[test]
    fn null_sink_counts() {
        let mut sink = NullSink::new();
        let counter = sink.counter();
        for _ in 0..3 {
            sink.present(frame(2, 2));
        }
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn snapshot_writes_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.jpg");
        let mut sink = SnapshotSink::new(path.clone(), Duration::ZERO, 80);
        sink.present(frame(32, 16));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = JpegCodec::new().decode(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (32, 16));
        assert!(!path.with_extension("jpg.tmp").exists());
    }

    #[test]
    fn snapshot_respects_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            SnapshotSink::new(dir.path().join("latest.jpg"), Duration::from_secs(3600), 80);
        let written = sink.written_counter();
        for _ in 0..5 {
            sink.present(frame(8, 8));
        }
        assert_eq!(written.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn snapshot_to_missing_directory_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotSink::new(
            dir.path().join("absent").join("latest.jpg"),
            Duration::ZERO,
            80,
        );
        let written = sink.written_counter();
        sink.present(frame(8, 8));
        sink.present(frame(8, 8));
        assert_eq!(written.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn build_sink_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let display = DisplayConfig {
            sink: SinkKind::Snapshot,
            snapshot_path: dir.path().join("out.jpg"),
            snapshot_interval_ms: 0,
            snapshot_quality: 70,
        };
        let mut sink = build_sink(&display);
        sink.present(frame(4, 4));
        assert!(display.snapshot_path.exists());
    }
}
