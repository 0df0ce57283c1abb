//! VanFleet HTTP server

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vanfleet::server::config::AppConfig;
use vanfleet::server::{ServerBuilder, VanFleetServer};

#[derive(Debug, Parser)]
#[command(name = "vanfleet-server", version, about = "School transport fleet backend")]
struct Cli {
    /// Configuration file (TOML or JSON), layered under VANFLEET__* variables
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override server.bind_address
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, initiating graceful shutdown")
                    }
                }
                return;
            }
            Err(err) => error!(error = %err, "Unable to listen for SIGTERM"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!(error = %err, "Unable to listen for shutdown signal"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    config.validate().context("invalid configuration")?;

    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting VanFleet server");

    let server: Arc<VanFleetServer> = Arc::new(
        ServerBuilder::from_config(&config)
            .build()
            .context("building server")?,
    );

    tokio::spawn({
        let server = server.clone();
        async move {
            wait_for_signal().await;
            if let Err(err) = server.shutdown() {
                error!(error = %err, "Failed to signal shutdown");
            }
        }
    });

    server.run().await.context("serving HTTP")?;
    info!("VanFleet server shutdown complete");
    Ok(())
}
