//! Zone Control Plane Entry Point
//!
//! Runs the authenticated HTTP control interface for DNS zones:
//! - Bearer token protected zone list/get/create endpoints
//! - Zone documents persisted as `<zones_dir>/<name>.json`
//! - Zones restored from disk at startup
//! - Graceful shutdown on Ctrl-C
//!
//! ## Usage
//!
//! ```bash
//! # Run with a configuration file
//! dns-control --config /etc/dns/control.toml
//!
//! # Override individual settings
//! dns-control --config control.toml --listen 127.0.0.1:9053 --zones-dir ./zones
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use dns_control::{
    BearerAuth, ControlApi, ControlConfig, ControlServer, MemoryRegistry, ServerTimeouts,
    ZoneFiles,
};

/// DNS zone control plane
#[derive(Parser, Debug)]
#[command(name = "dns-control")]
#[command(version)]
#[command(about = "Authenticated HTTP control plane for DNS zones", long_about = None)]
struct Args {
    /// Path to configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address for the control API
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Bearer token required on every request
    #[arg(long)]
    token: Option<String>,

    /// Directory holding zone documents
    #[arg(long)]
    zones_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting DNS control plane v{}", env!("CARGO_PKG_VERSION"));

    let mut config = if let Some(config_path) = &args.config {
        let content = std::fs::read_to_string(config_path)?;
        ControlConfig::from_toml(&content)?
    } else {
        ControlConfig::default()
    };

    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }
    if let Some(token) = args.token {
        config.http.token = token;
    }
    if let Some(zones_dir) = args.zones_dir {
        config.http.zones_dir = zones_dir;
    }

    config.validate()?;

    std::fs::create_dir_all(&config.http.zones_dir)?;
    info!("Zone directory: {}", config.http.zones_dir.display());

    let registry = Arc::new(MemoryRegistry::new());
    let files = ZoneFiles::new(&config.http.zones_dir);
    let restored = files.restore_to(registry.as_ref()).await?;
    info!("Restored {} zones from {}", restored, files.dir().display());

    let api = ControlApi::new(registry, files, BearerAuth::new(config.http.token.clone()))
        .with_max_body_bytes(config.http.max_body_bytes);
    let server = ControlServer::new(Arc::new(api), ServerTimeouts::from(&config.http));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    cancel.cancel();
                }
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        });
    }

    if let Err(e) = server.run(config.http.listen, cancel).await {
        error!("Control plane error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
