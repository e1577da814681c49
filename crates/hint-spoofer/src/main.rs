//! # Hint Spoofer
//!
//! Tampers with a local hint area so the junction hardening modes can be
//! observed under attack.
//!
//! ## Usage
//! ```bash
//! # Overwrite every junction's hint with "all red" every 300ms
//! hint-spoofer flood --hints-dir hints
//!
//! # Keep junction 2's record pinned to a chosen message
//! hint-spoofer pin --hints-dir hints --junction 2 --message "0 1 0 1"
//! ```
//!
//! `flood` defeats baseline mode outright; signed mode rejects it unless the
//! forger also copies the owner's id. `pin` with a foreign id shows the
//! signature check at work.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use junction_common::constants::{DEFAULT_HINTS_DIR, JUNCTION_PREFIX, junction_name};

/// Message written by `flood`: no approach flowing
const ALL_RED: &str = "0 0 0 0";

/// Junction hint tampering harness
#[derive(Parser, Debug)]
#[command(name = "hint-spoofer")]
#[command(author, version, about = "Tamper with junction hint records", long_about = None)]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Hint directory to tamper with
    #[arg(long, global = true, default_value = DEFAULT_HINTS_DIR)]
    hints_dir: PathBuf,

    /// Delay between overwrites in milliseconds
    #[arg(long, global = true, default_value = "300")]
    interval_ms: u64,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Overwrite every existing junction record with an all-red hint
    Flood,
    /// Keep one junction's record set to a fixed message
    Pin {
        /// Junction whose record is overwritten
        #[arg(short, long)]
        junction: u32,

        /// Raw record contents, e.g. "0 1 0 1" or "3 0 1 0 1"
        #[arg(short, long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(dir = %args.hints_dir.display(), mode = ?args.mode, "🎭 Hint spoofer started");

    let rounds = spoof(&args, tokio::signal::ctrl_c()).await?;
    info!(rounds, "🎭 Hint spoofer stopped");

    Ok(())
}

/// Tamper on every interval until `shutdown` resolves; returns rounds run
///
/// `shutdown` is polled across rounds, so a signal raised mid-round stops the
/// loop once that round ends.
async fn spoof<F: Future>(args: &Args, shutdown: F) -> Result<u64> {
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    tokio::pin!(shutdown);

    let mut rounds = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let written = match &args.mode {
                    Mode::Flood => flood_once(&args.hints_dir).await?,
                    Mode::Pin { junction, message } => {
                        pin_once(&args.hints_dir, *junction, message).await?;
                        1
                    }
                };
                rounds += 1;
                info!(records = written, "Spoofed hints");
            }
        }
    }

    Ok(rounds)
}

/// Overwrite every junction record in `dir`; returns how many were hit
async fn flood_once(dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;

    let mut written = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(JUNCTION_PREFIX) {
            continue;
        }
        tokio::fs::write(entry.path(), ALL_RED)
            .await
            .with_context(|| format!("Failed to overwrite {}", entry.path().display()))?;
        tracing::debug!(record = %entry.path().display(), "Overwrote hint");
        written += 1;
    }

    Ok(written)
}

/// Write `message` into one junction's record
async fn pin_once(dir: &Path, junction: u32, message: &str) -> Result<()> {
    let path = dir.join(junction_name(junction));
    tokio::fs::write(&path, message)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
