//! Windlass Control - host CLI for the windlass self-update subsystem.
//!
//! Thin argument plumbing only: every command builds an `UpdateConfig` and
//! hands off to `windlass_update::AutoUpdater`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_UPDATE_URL: &str = "https://releases.windlass.dev/latest.json";

#[derive(Parser)]
#[command(name = "windlassctl")]
#[command(about = "Manage a windlass installation", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Release manifest URL
    #[arg(long, env = "WINDLASS_UPDATE_URL", default_value = DEFAULT_UPDATE_URL, global = true)]
    url: String,

    /// Directory for update state (defaults to the platform state dir)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Directory for downloaded payloads (defaults to the platform cache dir)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Consider prerelease versions
    #[arg(long, global = true)]
    prerelease: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check for and install the latest release
    Update {
        /// Install without asking for confirmation
        #[arg(long)]
        yes: bool,

        /// Relaunch into the new binary after installing
        #[arg(long)]
        restart: bool,
    },

    /// Check the update server and report where this install stands
    Status,

    /// Stop notifying about the currently available version
    Skip,

    /// Remove stale downloads from the cache
    Cleanup,

    /// Interval-gated background check; prints a notice when an update is
    /// pending (intended for embedding in wrapper scripts)
    Notify,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = commands::build_config(&cli);

    match cli.command {
        Commands::Update { yes, restart } => commands::update(config, yes, restart).await,
        Commands::Status => commands::status(config).await,
        Commands::Skip => commands::skip(config).await,
        Commands::Cleanup => commands::cleanup(config),
        Commands::Notify => commands::notify(config).await,
    }
}
