//! Pipeline lifecycle state shared by every worker loop of a session.
//!
//! A [`Lifecycle`] publishes the current [`PipelineState`] through a
//! `tokio::sync::watch` channel. Loops poll it at their iteration
//! boundary and may also await [`Lifecycle::stopping`] while suspended.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::FramecastError;

// ── PipelineState ────────────────────────────────────────────────

/// The current phase of a streaming session.
///
/// ```text
///  Idle ──► Connecting ──► Streaming ──► Stopping ──► Stopped
///    │           │                          ▲
///    └───────────┴──────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Constructed, nothing started. Initial state.
    #[default]
    Idle,

    /// Connection being established.
    Connecting,

    /// Worker loops are running.
    Streaming,

    /// Shutdown requested or a fatal error occurred; loops are exiting.
    Stopping,

    /// All loops joined and resources released. Terminal state.
    Stopped,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

impl PipelineState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// `true` once shutdown has begun (`Stopping` or `Stopped`).
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

// ── Lifecycle ────────────────────────────────────────────────────

/// Cloneable handle to a session's lifecycle state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<PipelineState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PipelineState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> PipelineState {
        *self.tx.borrow()
    }

    pub fn is_streaming(&self) -> bool {
        self.current().is_streaming()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.tx.subscribe()
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Idle`.
    pub fn begin_connect(&self) -> Result<(), FramecastError> {
        self.transition(PipelineState::Connecting, |s| {
            matches!(s, PipelineState::Idle)
        })
    }

    /// Transition to `Streaming`.
    ///
    /// Valid from: `Connecting`.
    pub fn begin_streaming(&self) -> Result<(), FramecastError> {
        self.transition(PipelineState::Streaming, |s| {
            matches!(s, PipelineState::Connecting)
        })
    }

    /// Transition to `Stopping`.
    ///
    /// Returns `true` if this call initiated the shutdown and `false` if
    /// the session was already stopping or stopped.
    pub fn request_stop(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_shutting_down() {
                false
            } else {
                *state = PipelineState::Stopping;
                true
            }
        })
    }

    /// Transition to the terminal `Stopped` state. Idempotent.
    pub fn finish_stop(&self) {
        self.tx.send_if_modified(|state| {
            if *state == PipelineState::Stopped {
                false
            } else {
                *state = PipelineState::Stopped;
                true
            }
        });
    }

    /// Resolves once shutdown has begun.
    pub async fn stopping(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|s| s.is_shutting_down()).await;
    }

    fn transition(
        &self,
        to: PipelineState,
        valid_from: impl Fn(&PipelineState) -> bool,
    ) -> Result<(), FramecastError> {
        let mut from = PipelineState::Idle;
        let changed = self.tx.send_if_modified(|state| {
            from = *state;
            if valid_from(state) {
                *state = to;
                true
            } else {
                false
            }
        });
        if changed {
            Ok(())
        } else {
            Err(FramecastError::InvalidTransition { from, to })
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
