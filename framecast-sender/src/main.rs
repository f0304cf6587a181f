//! framecast sender entry point.
//!
//! ```text
//! framecast-sender                       Stream to the configured viewer
//! framecast-sender --config <path>       Load a custom config TOML
//! framecast-sender --server 10.0.0.2 --port 7340 --fps 15
//! framecast-sender --gen-config          Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_core::{ProfilePreset, SessionOutcome};
use framecast_sender::config::SenderConfig;
use framecast_sender::service::SenderService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-sender", about = "Stream frames to a framecast viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-sender.toml")]
    config: PathBuf,

    /// Viewer host (overrides `network.server_host`).
    #[arg(short, long)]
    server: Option<String>,

    /// Viewer port (overrides `network.server_port`).
    #[arg(short, long)]
    port: Option<u16>,

    /// Target frames per second (overrides `stream.fps`).
    #[arg(long)]
    fps: Option<u32>,

    /// Profile preset: balanced, low-bandwidth, high-fidelity.
    #[arg(long)]
    profile: Option<ProfilePreset>,

    /// Keep quality fixed at its initial value.
    #[arg(long)]
    no_adaptive: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then apply CLI overrides.
    let mut config = SenderConfig::load(&cli.config);
    if let Some(server) = cli.server {
        config.network.server_host = server;
    }
    if let Some(port) = cli.port {
        config.network.server_port = port;
    }
    if let Some(fps) = cli.fps {
        config.stream.fps = fps;
    }
    if let Some(profile) = cli.profile {
        config.stream.profile = profile;
    }
    if cli.no_adaptive {
        config.stream.adaptive_quality = false;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("viewer: {}:{}", config.network.server_host, config.network.server_port);
    info!("target FPS: {}", config.stream.fps);
    info!("profile: {}", config.stream.profile);
    info!("adaptive quality: {}", config.stream.adaptive_quality);

    let service = SenderService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let outcome = service.run().await?;
    if outcome != SessionOutcome::Stopped {
        return Err(outcome.to_string().into());
    }
    Ok(())
}
