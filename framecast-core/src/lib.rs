//! # framecast-core
//!
//! Real-time framed screen streaming pipeline.
//!
//! This crate contains:
//! - **Frames**: `RawFrame`, `PixelFormat`
//! - **Buffer**: `FrameBuffer`, a bounded drop-newest FIFO between capture and encode
//! - **Codec**: `EnvelopeCodec`, the u32 length-prefix wire format for `tokio_util`
//! - **Transport**: `FrameWriter` / `FrameReader` plus TCP setup with socket tuning
//! - **Quality**: `QualityController`, the hysteresis feedback loop over encode quality
//! - **Timing**: `TimingWindow`, per-frame samples and performance reports
//! - **Profile**: `PlatformProfile` presets and one-shot capability negotiation
//! - **Pipeline**: `SenderSession` and `ReceiverSession`
//! - **Collaborators**: `FrameSource` / `FrameEncoder` / `FrameDecoder` / `FrameSink`
//!   traits, `JpegCodec` and a synthetic `TestPatternSource`
//! - **Error**: `FramecastError`, a typed, `thiserror`-based error hierarchy

pub mod buffer;
pub mod codec;
pub mod error;
pub mod frame;
pub mod jpeg;
pub mod pipeline;
pub mod profile;
pub mod quality;
pub mod source;
pub mod state;
pub mod timing;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use buffer::{DEFAULT_BUFFER_CAPACITY, FrameBuffer, PopOutcome, PushOutcome};
pub use codec::{DEFAULT_MAX_RECEIVE_PAYLOAD, EnvelopeCodec, MAX_ENVELOPE_PAYLOAD};
pub use error::{CaptureError, CodecError, FramecastError, Result};
pub use frame::{PixelFormat, RawFrame};
pub use jpeg::JpegCodec;
pub use pipeline::{ReceiverSession, ReceiverStats, SenderSession, SessionOutcome, StreamSettings};
pub use profile::{PlatformProfile, ProfilePreset, ResolvedProfile, negotiate};
pub use quality::{Adjustment, QualityController, QualityState};
pub use source::{FrameDecoder, FrameEncoder, FrameSink, FrameSource, TestPatternSource};
pub use state::{Lifecycle, PipelineState};
pub use timing::{PerformanceReport, TimingSample, TimingWindow};
pub use transport::{FrameReader, FrameWriter, SocketOptions};
