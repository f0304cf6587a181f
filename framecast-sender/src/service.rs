//! Sender service core logic.
//!
//! Negotiates capabilities once, connects to the viewer and runs a
//! [`SenderSession`] until the connection drops or the service is
//! stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use framecast_core::{
    FrameSource, FramecastError, JpegCodec, SenderSession, SessionOutcome, TestPatternSource,
    negotiate,
};

use crate::config::SenderConfig;

// ── SenderService ────────────────────────────────────────────────

/// The top-level sender service.
pub struct SenderService {
    config: SenderConfig,
    running: Arc<AtomicBool>,
}

impl SenderService {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that stops the service from another task when set to
    /// `false`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stream the built-in test pattern.
    pub async fn run(&self) -> Result<SessionOutcome, FramecastError> {
        let source = TestPatternSource::new(self.config.source.width, self.config.source.height);
        self.run_with_source(source).await
    }

    /// Stream frames from `source` until stopped or disconnected.
    ///
    /// 1. Validates the configuration.
    /// 2. Probes the source and resolves the platform profile.
    /// 3. Connects and starts a [`SenderSession`].
    /// 4. Shuts the session down when `running` becomes `false`.
    pub async fn run_with_source<S: FrameSource>(
        &self,
        mut source: S,
    ) -> Result<SessionOutcome, FramecastError> {
        self.config.validate()?;
        self.running.store(true, Ordering::SeqCst);

        let profile = self.config.profile();
        let encoder = Arc::new(JpegCodec::with_max_width(profile.max_width));
        let initial_quality = self.config.stream.initial_quality;

        let probe_encoder = Arc::clone(&encoder);
        let (source, resolved) = tokio::task::spawn_blocking(move || {
            let resolved = negotiate(&profile, &mut source, &*probe_encoder, initial_quality);
            (source, resolved)
        })
        .await?;
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                self.stop();
                return Err(e);
            }
        };

        let net = &self.config.network;
        let session = match SenderSession::connect(
            &net.server_host,
            net.server_port,
            &self.config.to_socket_options(),
            self.config.to_stream_settings(),
            &resolved,
            source,
            encoder,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                self.stop();
                return Err(e);
            }
        };
        info!("streaming to {}:{}", net.server_host, net.server_port);

        let outcome = tokio::select! {
            outcome = session.wait() => outcome,
            _ = Self::wait_for_stop(&self.running) => session.shutdown().await,
        };

        self.stop();
        info!(%outcome, "sender service stopped");
        Ok(outcome)
    }

    /// Resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
