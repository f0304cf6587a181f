//! Client-role session: capture, encode/transmit and reporting loops over
//! one connection.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::buffer::FrameBuffer;
use crate::error::Result;
use crate::profile::ResolvedProfile;
use crate::quality::{QualityController, QualityState};
use crate::source::{FrameEncoder, FrameSource};
use crate::state::{Lifecycle, PipelineState};
use crate::timing::{PerformanceReport, PipelineCounters, TimingWindow};
use crate::transport::{self, FrameWriter, SocketOptions};

use super::{SessionOutcome, StreamSettings, capture, merge_outcome, report, supervised, transmit};

// ── Shared state ─────────────────────────────────────────────────

/// State the sender loops share. Owned by the session, never global.
pub(super) struct SenderShared {
    pub lifecycle: Lifecycle,
    pub buffer: FrameBuffer,
    pub quality: QualityState,
    pub timing: Mutex<TimingWindow>,
    pub counters: PipelineCounters,
}

impl SenderShared {
    pub fn report(&self) -> PerformanceReport {
        let window = self.timing.lock();
        PerformanceReport::collect(&self.counters, &window, self.buffer.dropped(), self.quality.get())
    }
}

type TaskHandle = JoinHandle<Result<SessionOutcome>>;

/// Worker handles still to be joined, plus the outcome merged from the
/// ones already joined. A handle leaves its slot only after its join
/// completes, so a cancelled shutdown resumes where it stopped.
struct SessionTasks {
    capture: Option<TaskHandle>,
    transmit: Option<TaskHandle>,
    report: Option<TaskHandle>,
    outcome: SessionOutcome,
}

impl SessionTasks {
    async fn join(slot: &mut Option<TaskHandle>, outcome: &mut SessionOutcome) {
        if let Some(handle) = slot.as_mut() {
            let joined = handle.await;
            *slot = None;
            *outcome = merge_outcome(outcome.clone(), joined);
        }
    }
}

// ── SenderSession ────────────────────────────────────────────────

/// A running sender pipeline.
///
/// Created by [`connect`](Self::connect) (or [`start`](Self::start) over
/// an already-open stream). Ends when [`shutdown`](Self::shutdown) is
/// called or the transport fails.
pub struct SenderSession {
    shared: Arc<SenderShared>,
    tasks: tokio::sync::Mutex<Option<SessionTasks>>,
    outcome: Mutex<Option<SessionOutcome>>,
}

impl SenderSession {
    /// Connect to `host:port` and start streaming.
    ///
    /// Connection failures are returned before any loop starts.
    pub async fn connect<S, E>(
        host: &str,
        port: u16,
        options: &SocketOptions,
        settings: StreamSettings,
        profile: &ResolvedProfile,
        source: S,
        encoder: Arc<E>,
    ) -> Result<Self>
    where
        S: FrameSource,
        E: FrameEncoder + ?Sized,
    {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_connect()?;
        tracing::info!(host, port, "connecting to viewer");

        let stream: TcpStream = match transport::connect(host, port, options).await {
            Ok(stream) => stream,
            Err(e) => {
                lifecycle.request_stop();
                lifecycle.finish_stop();
                return Err(e);
            }
        };
        let writer = FrameWriter::new(stream).with_timeout(options.io_timeout);
        Self::launch(lifecycle, settings, profile, source, encoder, writer)
    }

    /// Start streaming over an established writer.
    pub fn start<S, E, W>(
        settings: StreamSettings,
        profile: &ResolvedProfile,
        source: S,
        encoder: Arc<E>,
        writer: FrameWriter<W>,
    ) -> Result<Self>
    where
        S: FrameSource,
        E: FrameEncoder + ?Sized,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_connect()?;
        Self::launch(lifecycle, settings, profile, source, encoder, writer)
    }

    fn launch<S, E, W>(
        lifecycle: Lifecycle,
        settings: StreamSettings,
        profile: &ResolvedProfile,
        source: S,
        encoder: Arc<E>,
        writer: FrameWriter<W>,
    ) -> Result<Self>
    where
        S: FrameSource,
        E: FrameEncoder + ?Sized,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if settings.buffer_capacity == 0 {
            return Err(crate::FramecastError::InvalidConfig(
                "buffer capacity must be > 0".into(),
            ));
        }

        let p = &profile.profile;
        let controller =
            QualityController::new(settings.frame_interval(), p.quality_step, p.quality_min, p.quality_max)
                .with_enabled(settings.adaptive && profile.adaptive);
        let initial_quality = controller.clamp(profile.initial_quality);

        let shared = Arc::new(SenderShared {
            lifecycle,
            buffer: FrameBuffer::new(settings.buffer_capacity),
            quality: QualityState::new(initial_quality),
            timing: Mutex::new(TimingWindow::new()),
            counters: PipelineCounters::default(),
        });

        shared.lifecycle.begin_streaming()?;
        tracing::info!(
            fps = settings.target_fps,
            quality = initial_quality,
            adaptive = controller.is_enabled(),
            buffer = settings.buffer_capacity,
            "streaming started"
        );

        let lifecycle = shared.lifecycle.clone();
        let tasks = SessionTasks {
            capture: Some(tokio::spawn(supervised(
                lifecycle.clone(),
                capture::run(source, Arc::clone(&shared), settings.frame_interval(), p.min_sleep),
            ))),
            transmit: Some(tokio::spawn(supervised(
                lifecycle.clone(),
                transmit::run(encoder, writer, Arc::clone(&shared), controller, settings.pop_timeout),
            ))),
            report: Some(tokio::spawn(supervised(
                lifecycle,
                report::run(Arc::clone(&shared), settings.report_interval),
            ))),
            outcome: SessionOutcome::Stopped,
        };

        Ok(Self {
            shared,
            tasks: tokio::sync::Mutex::new(Some(tasks)),
            outcome: Mutex::new(None),
        })
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn state(&self) -> PipelineState {
        self.shared.lifecycle.current()
    }

    /// Cloneable lifecycle handle, for observing state from elsewhere.
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle.clone()
    }

    /// Quality the next frame will be encoded at.
    pub fn quality(&self) -> u8 {
        self.shared.quality.get()
    }

    pub fn report(&self) -> PerformanceReport {
        self.shared.report()
    }

    // ── Shutdown ─────────────────────────────────────────────────

    /// Signal the loops to stop without waiting for them.
    pub fn stop(&self) {
        if self.shared.lifecycle.request_stop() {
            tracing::info!("shutdown requested");
        }
        self.shared.buffer.close();
    }

    /// Resolves when the session has begun stopping for any reason, then
    /// completes the shutdown.
    pub async fn wait(&self) -> SessionOutcome {
        self.shared.lifecycle.stopping().await;
        self.shutdown().await
    }

    /// Stop the loops, join them and release the connection.
    ///
    /// Idempotent: later calls return the outcome of the first. Safe to
    /// cancel; a dropped call leaves the remaining joins to the next one.
    pub async fn shutdown(&self) -> SessionOutcome {
        let mut tasks = self.tasks.lock().await;
        let Some(running) = tasks.as_mut() else {
            return self
                .outcome
                .lock()
                .clone()
                .unwrap_or(SessionOutcome::Stopped);
        };

        self.stop();

        // Transmit first: its result decides the outcome.
        SessionTasks::join(&mut running.transmit, &mut running.outcome).await;
        SessionTasks::join(&mut running.capture, &mut running.outcome).await;
        SessionTasks::join(&mut running.report, &mut running.outcome).await;
        let outcome = running.outcome.clone();
        *tasks = None;

        self.shared.lifecycle.finish_stop();
        tracing::info!(%outcome, "session ended");
        *self.outcome.lock() = Some(outcome.clone());
        outcome
    }
}
