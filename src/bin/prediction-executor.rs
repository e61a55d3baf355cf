//! # Prediction Executor
//!
//! Standalone worker process.
//!
//! ## Usage
//!
//! ```bash
//! # Sync mode with the base configuration
//! PREDICTION_EXECUTOR__QUEUE__CONNECTION_STRING=memory://tasks \
//!     prediction-executor --config config/executor.toml
//!
//! # Production overrides, push-driven processing
//! prediction-executor --config config/executor.toml --environment production --mode async
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

use prediction_executor::config::{ConfigManager, ExecutionMode};
use prediction_executor::executor::{Collaborators, PredictionExecutor};
use prediction_executor::logging;
use prediction_executor::shutdown::ShutdownSignal;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Sync,
    Async,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sync => ExecutionMode::Sync,
            ModeArg::Async => ExecutionMode::Async,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "prediction-executor", version, about = "Run the prediction executor")]
struct Cli {
    /// Base configuration file
    #[arg(short, long, default_value = "config/executor.toml")]
    config: PathBuf,

    /// Environment override (defaults to PREDICTION_EXECUTOR_ENV or development)
    #[arg(short, long)]
    environment: Option<String>,

    /// Override the configured execution mode
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Print the sanitized configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_structured_logging();

    info!("🚀 Starting Prediction Executor...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let manager = ConfigManager::load_from_file(&cli.config, cli.environment.as_deref())
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
        return Ok(());
    }

    info!("   Environment: {}", manager.environment());

    let mut config = manager.into_config();
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }

    let executor = PredictionExecutor::from_config(config, Collaborators::default())
        .context("Failed to initialize prediction executor")?;

    let shutdown = ShutdownSignal::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("🛑 Shutdown signal received, finishing in-flight work...");
        trigger.trigger();
    });

    info!("   Press Ctrl+C to shutdown gracefully");
    if let Err(e) = executor.run(shutdown).await {
        error!(error = %e.chain(), "Executor stopped with an error");
        return Err(e.into());
    }

    info!("👋 Prediction executor shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
