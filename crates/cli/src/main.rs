//! VMS CLI - Command-line interface for the Visitor Management System
//!
//! Usage:
//!   vms serve [--config vms.yaml]          - Run the REST server and sync worker
//!   vms init [dir] [--force]               - Write a starter configuration
//!   vms sync status|drain|retry|purge      - Inspect and work the sync queue
//!   vms manifest check <dir>               - Validate actor manifests
//!   vms residency resolve --company <id>   - Ask where a company's data lives

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cli::commands::{InitCommand, ManifestCommand, ResidencyCommand, ServeCommand, SyncCommand};

#[derive(Parser)]
#[command(name = "vms")]
#[command(about = "VMS - Visitor management with Platform federation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML or JSON); ./vms.yaml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST server
    Serve(ServeCommand),
    /// Initialize a new VMS installation
    Init(InitCommand),
    /// Sync queue maintenance
    Sync(SyncCommand),
    /// Actor manifest tools
    Manifest(ManifestCommand),
    /// Residency resolution
    Residency(ResidencyCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Serve(cmd) => cmd.run(config).await,
        Commands::Init(cmd) => cmd.run(),
        Commands::Sync(cmd) => cmd.run(config).await,
        Commands::Manifest(cmd) => cmd.run(),
        Commands::Residency(cmd) => cmd.run(config).await,
    }
}
