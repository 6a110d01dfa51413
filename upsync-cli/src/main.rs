//! upsync: incremental build artifact sync.
//!
//! # Usage
//!
//! ```text
//! upsync sync [--config FILE] [--output-dir DIR] [--bucket-root DIR] [--dry-run] ...
//! upsync plan [--json] ...
//! upsync public-path ...
//! ```
//!
//! Settings come from `.upsync.yaml` in the working directory (or `--config`),
//! overridden by flags. Set `RUST_LOG=info` for per-artifact logging.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{plan::PlanArgs, public_path::PublicPathArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "upsync",
    version,
    about = "Upload changed build artifacts and retire stale ones",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload new artifacts, delete stale ones, and advance the manifest.
    Sync(SyncArgs),

    /// Show what a sync would upload and delete.
    Plan(PlanArgs),

    /// Print the public URL prefix for the bundler.
    PublicPath(PublicPathArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::PublicPath(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
