//! # junctiond - Junction Controller
//!
//! Runs one traffic junction. Every tick it reads the junction's vehicle
//! counts, weighs them against neighbour hints and its own starvation
//! counters, then publishes its flow decision and sets the lights.
//!
//! ## Architecture
//! ```text
//!  World-State store  <--- counts / lights --->  junctiond
//!                                                   ^  |
//!        neighbour hints (hints/junction-<id>) -----+  +---> own hint
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod controller;
mod engine;
mod hints;
mod world_state;

use config::AppConfig;
use controller::Controller;

/// Junction controller
#[derive(Parser, Debug)]
#[command(name = "junctiond")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/junction.toml")]
    config: String,

    /// Junction to control (overrides config)
    #[arg(short = 'j', long, env = "JUNCTION_ID")]
    junction_id: Option<u32>,

    /// Stop after this many ticks (default: run until stopped)
    #[arg(short = 'n', long)]
    max_iterations: Option<u64>,

    /// Hint directory (overrides config)
    #[arg(long, env = "HINTS_DIR")]
    hints_dir: Option<String>,

    /// World-state Unix socket (overrides config)
    #[arg(long, env = "WORLD_STATE_SOCKET")]
    world_state: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("🚦 Starting junctiond v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    config.validate().context("Invalid configuration")?;
    info!(
        config = %serde_json::to_string(&config)?,
        "📋 Configuration loaded from {}",
        args.config
    );

    let mut controller = Controller::connect(&config).await?;
    info!("✅ World-state connected");

    // Create shutdown broadcast channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Handle graceful shutdown
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        info!("🛑 Shutdown signal received");
        let _ = signal_tx.send(());
    });

    let summary = controller
        .run(args.max_iterations, shutdown_rx)
        .await
        .context("Controller loop failed")?;

    drop(shutdown_tx);
    info!(
        ticks = summary.ticks,
        aborted = summary.aborted,
        "👋 junctiond shutdown complete"
    );
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
