//! Frame types moved between pipeline stages.
//!
//! A [`RawFrame`] is owned by exactly one stage at a time: the source
//! hands it to the capture loop, the buffer holds it, the encode stage
//! consumes it. It is never shared.

use std::time::{Duration, Instant};

use crate::error::CodecError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (typical desktop capture).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed raster plus capture metadata.
///
/// `data` holds `height` rows of `stride` bytes each; `stride` may exceed
/// `width * bytes_per_pixel` when the capture backend pads rows.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row pitch in bytes.
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data, `stride * height` bytes.
    pub data: Vec<u8>,
    /// When capture of this frame started.
    pub captured_at: Instant,
    /// How long the frame source took to produce it.
    pub capture_duration: Duration,
    /// Monotonic per-session sequence number assigned by the capture loop.
    pub sequence: u64,
}

impl RawFrame {
    /// Build a tightly packed frame (`stride == width * bpp`).
    ///
    /// A stride that does not fit in `u32` saturates, which
    /// [`validate`](Self::validate) then rejects.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        let stride = width.saturating_mul(format.bytes_per_pixel() as u32);
        Self {
            width,
            height,
            stride,
            format,
            data,
            captured_at: Instant::now(),
            capture_duration: Duration::ZERO,
            sequence: 0,
        }
    }

    /// Total byte size the bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Check that the buffer is large enough for the declared geometry.
    pub fn validate(&self) -> Result<(), CodecError> {
        let min_stride = self.width as usize * self.format.bytes_per_pixel();
        if (self.stride as usize) < min_stride {
            return Err(CodecError::InvalidFrame(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, min_stride
            )));
        }
        if self.data.len() < self.byte_len() {
            return Err(CodecError::InvalidFrame(format!(
                "buffer holds {} bytes, geometry needs {}",
                self.data.len(),
                self.byte_len()
            )));
        }
        Ok(())
    }

    /// Returns a row slice without trailing padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &self.data[start..start + len]
    }

    /// Repack the pixels as tightly packed RGB8.
    pub fn to_rgb8(&self) -> Result<Vec<u8>, CodecError> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            let row = self.row(y);
            match self.format {
                PixelFormat::Rgb8 => out.extend_from_slice(row),
                PixelFormat::Rgba8 => {
                    for px in row.chunks_exact(4) {
                        out.extend_from_slice(&px[..3]);
                    }
                }
                PixelFormat::Bgra8 => {
                    for px in row.chunks_exact(4) {
                        out.extend_from_slice(&[px[2], px[1], px[0]]);
                    }
                }
            }
        }
        Ok(out)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_frame_geometry() {
        let frame = RawFrame::new(4, 2, PixelFormat::Bgra8, vec![0; 32]);
        assert_eq!(frame.stride, 16);
        assert_eq!(frame.byte_len(), 32);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn oversized_width_is_rejected_not_panicking() {
        let frame = RawFrame::new(u32::MAX / 2, 1, PixelFormat::Bgra8, Vec::new());
        assert_eq!(frame.stride, u32::MAX);
        assert!(matches!(frame.validate(), Err(CodecError::InvalidFrame(_))));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let frame = RawFrame::new(4, 2, PixelFormat::Rgb8, vec![0; 10]);
        assert!(matches!(frame.validate(), Err(CodecError::InvalidFrame(_))));
    }

    #[test]
    fn bgra_to_rgb_swaps_channels() {
        let frame = RawFrame::new(1, 1, PixelFormat::Bgra8, vec![10, 20, 30, 255]);
        assert_eq!(frame.to_rgb8().unwrap(), vec![30, 20, 10]);
    }

    #[test]
    fn padded_rows_are_skipped() {
        let mut frame = RawFrame::new(1, 2, PixelFormat::Rgba8, Vec::new());
        frame.stride = 8;
        frame.data = vec![1, 2, 3, 4, 0xEE, 0xEE, 0xEE, 0xEE, 5, 6, 7, 8, 0xEE, 0xEE, 0xEE, 0xEE];
        assert_eq!(frame.to_rgb8().unwrap(), vec![1, 2, 3, 5, 6, 7]);
    }
}
