//! framecast viewer entry point.
//!
//! ```text
//! framecast-viewer                        Listen on the configured address
//! framecast-viewer --config <path>        Load a custom config TOML
//! framecast-viewer --port 7340 --once     Serve one sender, then exit
//! framecast-viewer --sink null            Count frames without writing files
//! framecast-viewer --gen-config           Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_viewer::config::{SinkKind, ViewerConfig};
use framecast_viewer::service::ViewerService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-viewer", about = "Receive and present a framecast stream")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-viewer.toml")]
    config: PathBuf,

    /// Bind address (overrides `network.bind_host`).
    #[arg(short, long)]
    bind: Option<String>,

    /// Listen port (overrides `network.port`).
    #[arg(short, long)]
    port: Option<u16>,

    /// Exit after the first session.
    #[arg(long)]
    once: bool,

    /// Frame sink: snapshot or null.
    #[arg(long)]
    sink: Option<SinkKind>,

    /// Snapshot file (overrides `display.snapshot_path`).
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(bind) = cli.bind {
        config.network.bind_host = bind;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if cli.once {
        config.session.once = true;
    }
    if let Some(sink) = cli.sink {
        config.display.sink = sink;
    }
    if let Some(path) = cli.snapshot {
        config.display.snapshot_path = path;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}:{}", config.network.bind_host, config.network.port);
    info!("sink: {:?}", config.display.sink);

    let service = ViewerService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let sessions = service.run().await?;
    info!("served {sessions} session(s)");
    Ok(())
}
