//! Tessel - ephemeral session service
//!
//! Main entry point for the Tessel CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod client;
mod commands;

use commands::{session, start, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tessel - ephemeral session service
#[derive(Parser)]
#[command(name = "tessel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: http://localhost:50051)
    #[arg(long, global = true, env = "TESSEL_SERVER_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Tessel server
    Start(start::StartArgs),

    /// Show server status
    Status(status::StatusArgs),

    /// Allocate, read and update sessions on a running server
    Session(session::SessionArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env feed clap's env lookups below
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Console output plus a daily rolling JSON log file
    let filter = if cli.verbose {
        "tessel=debug,tessel_session=debug,tessel_server=debug,tower_http=debug,info"
    } else {
        "tessel=info,tessel_session=info,tessel_server=info,warn"
    };

    let log_dir = dirs::data_local_dir()
        .map(|d| d.join("tessel").join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tessel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "tessel=trace,tessel_session=trace,tessel_server=trace,info",
                )),
        )
        .init();

    let server_url = cli
        .server
        .unwrap_or_else(|| "http://localhost:50051".to_string());

    let ctx = commands::Context {
        server_url,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Session(args) => session::run(args, &ctx).await,
    }
}
