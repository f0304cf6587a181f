//! Viewer service core logic.
//!
//! Binds the listener once, then serves one sender at a time: each
//! accepted connection runs a [`ReceiverSession`] until the sender goes
//! away, after which the next connection is accepted (unless `once`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use framecast_core::transport;
use framecast_core::{EnvelopeCodec, FrameReader, FramecastError, JpegCodec, ReceiverSession};

use crate::config::ViewerConfig;
use crate::sink::build_sink;

// ── ViewerService ────────────────────────────────────────────────

/// The top-level viewer service.
pub struct ViewerService {
    config: ViewerConfig,
    running: Arc<AtomicBool>,
}

impl ViewerService {
    pub fn new(config: ViewerConfig) -> Self {
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

    /// Validate, bind the configured address and serve. Returns the
    /// number of sessions served.
    pub async fn run(&self) -> Result<u64, FramecastError> {
        self.config.validate()?;
        let net = &self.config.network;
        let listener =
            transport::bind(&net.bind_host, net.port, &self.config.to_socket_options()).await?;
        self.serve(listener).await
    }

    /// Accept and serve senders on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<u64, FramecastError> {
        self.running.store(true, Ordering::SeqCst);
        info!("viewer listening on {}", listener.local_addr()?);

        let options = self.config.to_socket_options();
        let decoder = Arc::new(JpegCodec::new());
        let mut sessions = 0u64;

        while self.is_running() {
            let accepted = tokio::select! {
                accepted = transport::accept(&listener, &options) => accepted,
                _ = Self::wait_for_stop(&self.running) => break,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            info!(%peer, "sender connected");

            let codec = EnvelopeCodec::with_max_payload(self.config.network.max_payload_bytes);
            let reader = FrameReader::with_codec(stream, codec).with_timeout(options.io_timeout);
            let sink = build_sink(&self.config.display);
            let session = ReceiverSession::start(reader, Arc::clone(&decoder), sink)?;

            let outcome = tokio::select! {
                outcome = session.wait() => outcome,
                _ = Self::wait_for_stop(&self.running) => session.shutdown().await,
            };
            sessions += 1;

            let stats = session.stats();
            info!(
                %peer,
                %outcome,
                frames = stats.frames,
                bytes = stats.bytes,
                decode_failures = stats.decode_failures,
                fps = stats.fps,
                "session ended"
            );

            if self.config.session.once {
                break;
            }
        }

        self.stop();
        info!(sessions, "viewer service stopped");
        Ok(sessions)
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
