//! Collaborator traits the pipeline is generic over, plus a synthetic
//! source.
//!
//! All methods are synchronous and may block; the sessions call them on
//! the blocking pool.

use std::ops::RangeInclusive;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{CaptureError, CodecError};
use crate::frame::{PixelFormat, RawFrame};

// ── Traits ───────────────────────────────────────────────────────

/// Produces raw frames on demand.
pub trait FrameSource: Send + 'static {
    /// Capture one frame. Failures are treated as transient.
    fn capture(&mut self) -> Result<RawFrame, CaptureError>;
}

/// Compresses a raw frame at a given quality.
pub trait FrameEncoder: Send + Sync + 'static {
    fn encode(&self, frame: &RawFrame, quality: u8) -> Result<Bytes, CodecError>;

    /// Quality values the encoder understands. `None` means the encoder
    /// has no quality knob and adaptation is pointless.
    fn quality_range(&self) -> Option<RangeInclusive<u8>> {
        None
    }
}

/// Inverse of [`FrameEncoder`].
pub trait FrameDecoder: Send + Sync + 'static {
    fn decode(&self, payload: &[u8]) -> Result<RawFrame, CodecError>;
}

/// Consumes decoded frames. Fire-and-forget.
pub trait FrameSink: Send + 'static {
    fn present(&mut self, frame: RawFrame);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        (**self).capture()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, frame: RawFrame) {
        (**self).present(frame)
    }
}

// ── TestPatternSource ────────────────────────────────────────────

/// Deterministic BGRA source: vertical colour bars scrolling one column
/// per frame over a horizontal luminance ramp.
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_index: u64,
}

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [0, 255, 255],
    [255, 255, 0],
    [0, 255, 0],
    [255, 0, 255],
    [0, 0, 255],
    [255, 0, 0],
    [0, 0, 0],
];

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
        }
    }

    /// Frames produced so far.
    pub fn frames_produced(&self) -> u64 {
        self.frame_index
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let bar_width = (w / BARS.len()).max(1);
        let offset = self.frame_index as usize;
        let mut data = Vec::with_capacity(w * h * 4);

        for y in 0..h {
            // Ramp from full brightness at the top to half at the bottom.
            let shade = 255 - (y * 128 / h.max(1)) as u32;
            for x in 0..w {
                let [r, g, b] = BARS[((x + offset) / bar_width) % BARS.len()];
                let scale = |c: u8| (c as u32 * shade / 255) as u8;
                data.extend_from_slice(&[scale(b), scale(g), scale(r), 255]);
            }
        }
        data
    }
}

impl FrameSource for TestPatternSource {
    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::Unavailable("zero-sized test pattern".into()));
        }
        let started = Instant::now();
        let mut frame = RawFrame::new(self.width, self.height, PixelFormat::Bgra8, self.render());
        frame.captured_at = started;
        frame.capture_duration = started.elapsed();
        self.frame_index += 1;
        Ok(frame)
    }
}

// ── Tests ────────────────────────────────────────────────────────
