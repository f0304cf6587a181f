//! Domain-specific error types for the framecast pipeline.
//!
//! Fatal conditions (transport failures, configuration mistakes) are
//! [`FramecastError`]. Collaborator failures that the loops absorb and
//! log are [`CaptureError`] and [`CodecError`].

use std::time::Duration;
use thiserror::Error;

use crate::state::PipelineState;

/// The canonical error type for framecast.
#[derive(Debug, Error)]
pub enum FramecastError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A payload does not fit the 32-bit length prefix, or a received
    /// prefix exceeds the configured receive limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Configuration Errors ─────────────────────────────────────
    /// A host/port pair could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Port outside the permitted range.
    #[error("port {0} out of range (1024..=65535)")]
    PortOutOfRange(u16),

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binding or listening on the server socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Pipeline Errors ──────────────────────────────────────────
    /// A lifecycle transition was requested from the wrong state.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    /// A spawned worker task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),

    /// Frame source failure surfaced outside the capture loop (probing).
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Codec failure surfaced outside the encode/receive loops.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ── CaptureError ─────────────────────────────────────────────────

/// Failure reported by a [`FrameSource`](crate::source::FrameSource).
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No frame could be produced this time; the next call may succeed.
    #[error("capture failed: {0}")]
    Failed(String),

    /// The capture backend is gone (display detached, source exhausted).
    #[error("capture unavailable: {0}")]
    Unavailable(String),
}

// ── CodecError ───────────────────────────────────────────────────

/// Failure reported by a frame encoder or decoder.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("decoding failed: {0}")]
    Decode(String),

    /// The pixel buffer does not match its declared geometry.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

impl From<tokio::task::JoinError> for FramecastError {
    fn from(e: tokio::task::JoinError) -> Self {
        FramecastError::Task(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FramecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = FramecastError::PayloadTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));

        let e = FramecastError::PortOutOfRange(80);
        assert!(e.to_string().contains("80"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: FramecastError = io_err.into();
        assert!(matches!(e, FramecastError::Connection(_)));
    }

    #[test]
    fn collaborator_errors_are_transparent() {
        let e: FramecastError = CaptureError::Failed("no display".into()).into();
        assert_eq!(e.to_string(), "capture failed: no display");

        let e: FramecastError = CodecError::Decode("bad marker".into()).into();
        assert_eq!(e.to_string(), "decoding failed: bad marker");
    }

    #[test]
    fn invalid_transition_names_states() {
        let e = FramecastError::InvalidTransition {
            from: PipelineState::Stopped,
            to: PipelineState::Streaming,
        };
        assert_eq!(
            e.to_string(),
            "invalid lifecycle transition from Stopped to Streaming"
        );
    }
}
