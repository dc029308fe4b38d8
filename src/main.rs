//! Formrelay - Single-file form upload relay
//!
//! Accepts one file per form submission and streams it to a remote media host.

use clap::Parser;
use formrelay::metrics::server::MetricsServer;
use formrelay::{config::Config, server::Server};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Formrelay - form upload relay for a remote media host
#[derive(Parser, Debug)]
#[command(name = "formrelay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Formrelay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);
    info!("Relaying uploads to {}", config.remote.endpoint);

    // Start the metrics sidecar
    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(&config.metrics.address);
        let addr = server.start().await?;
        info!("Metrics server listening on {}", addr);
        Some(server)
    } else {
        None
    };

    // Start server
    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    if let Some(ref mut metrics_server) = metrics_server {
        metrics_server.shutdown().await;
    }

    Ok(())
}
