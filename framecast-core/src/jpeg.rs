//! JPEG frame codec backed by the `image` crate.

use std::io::Cursor;
use std::ops::RangeInclusive;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};

use crate::error::CodecError;
use crate::frame::{PixelFormat, RawFrame};
use crate::profile::scaled_dimensions;
use crate::source::{FrameDecoder, FrameEncoder};

/// Quality above which the slower cubic filter is used for scaling.
const CUBIC_FILTER_ABOVE: u8 = 70;

/// Encodes to baseline JPEG and decodes back to RGB8.
#[derive(Debug, Clone, Default)]
pub struct JpegCodec {
    max_width: Option<u32>,
}

impl JpegCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale frames wider than `max_width` down before encoding.
    pub fn with_max_width(max_width: u32) -> Self {
        Self {
            max_width: Some(max_width),
        }
    }
}

impl FrameEncoder for JpegCodec {
    fn encode(&self, frame: &RawFrame, quality: u8) -> Result<Bytes, CodecError> {
        let (width, height) = (frame.width, frame.height);
        let img = RgbImage::from_raw(width, height, frame.to_rgb8()?)
            .ok_or_else(|| CodecError::InvalidFrame(format!("{width}x{height} buffer mismatch")))?;

        let img = match self.max_width {
            Some(max) if width > max => {
                let (w, h) = scaled_dimensions(width, height, max);
                let filter = if quality > CUBIC_FILTER_ABOVE {
                    FilterType::CatmullRom
                } else {
                    FilterType::Triangle
                };
                imageops::resize(&img, w, h, filter)
            }
            _ => img,
        };

        let mut buf = Cursor::new(Vec::with_capacity(img.as_raw().len() / 8));
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        img.write_with_encoder(encoder)
            .map_err(|e| CodecError::Encode(e.to_string()))?;

        Ok(Bytes::from(buf.into_inner()))
    }

    fn quality_range(&self) -> Option<RangeInclusive<u8>> {
        Some(1..=100)
    }
}

impl FrameDecoder for JpegCodec {
    fn decode(&self, payload: &[u8]) -> Result<RawFrame, CodecError> {
        let img = image::load_from_memory_with_format(payload, ImageFormat::Jpeg)
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(RawFrame::new(width, height, PixelFormat::Rgb8, img.into_raw()))
    }
}

// ── Tests ────────────────────────────────────────────────────────
