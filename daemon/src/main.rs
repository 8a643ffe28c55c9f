//! teamboard daemon
//!
//! Serves the metrics API and, when enabled, the Prometheus endpoint.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use teamboard_daemon::{
    AppContext, DaemonConfig, config::StoreBackend, connect_store, metrics, serve,
    shutdown_signal,
};

const DEFAULT_CONFIG: &str = "teamboard.toml";

/// teamboard daemon - metrics API service
#[derive(Parser, Debug)]
#[command(name = "teamboardd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to ./teamboard.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Keep records in memory instead of PostgreSQL
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("teamboard daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let config = DaemonConfig::load(path).await?;
            info!("Loaded configuration from {}", path);
            config
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            let config = DaemonConfig::load(DEFAULT_CONFIG).await?;
            info!("Loaded configuration from {}", DEFAULT_CONFIG);
            config
        }
        None => {
            info!("No configuration file, using defaults");
            DaemonConfig::default()
        }
    };
    config.apply_env()?;
    if args.memory {
        config.store.backend = StoreBackend::Memory;
    }

    let store = connect_store(&config.store).await?;
    let bind = config.server.bind;
    let ctx = AppContext::new(config, store)?;

    // Start metrics server
    let metrics_handle = metrics::start_server(&ctx.config.monitoring, ctx.metrics.clone());

    let listener = TcpListener::bind(bind).await?;
    serve(listener, ctx, shutdown_signal()).await?;

    // Cleanup
    metrics_handle.abort();
    info!("Server shut down");

    Ok(())
}
