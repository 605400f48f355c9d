mod cli;
mod health;
mod lifecycle;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use tagdeploy_core::{load_config, validate_config, AmqpSource, StopOutcome, SystemCommandRunner};

use cli::Cli;
use lifecycle::Service;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Configuration comes first: it selects the log format
    let paths = cli.config_paths();
    let config = load_config(&paths)
        .with_context(|| format!("Failed to load config from {:?}", paths))?;
    validate_config(&config).context("Configuration validation failed")?;

    logging::init_logging(config.env);

    info!("tagdeploy {} starting ({:?})", VERSION, config.env);
    info!("Projects root: {}", config.paths.projects.display());
    info!("Command logs: {}", config.paths.commands_logs.display());
    info!("Configs root: {}", config.paths.configs.display());
    info!(
        "Telemetry endpoint {}:{} as {}",
        config.otlp.host, config.otlp.port, config.otlp.service_name
    );

    let runner = Arc::new(SystemCommandRunner::new());
    let service = Service::start(&config, runner, || AmqpSource::connect(&config.amqp)).await?;

    shutdown_signal().await;
    info!("Shutdown signal received");

    match service.shutdown().await {
        StopOutcome::Drained => info!("Shutdown complete"),
        StopOutcome::TimedOut { still_running } => warn!(
            "Shutdown complete, {} deployment(s) did not finish",
            still_running
        ),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
