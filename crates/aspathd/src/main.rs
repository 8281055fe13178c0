//! aspathd — the ASPATH daemon.
//!
//! Single binary that assembles the ASPATH subsystems:
//! - Snapshot store (redb)
//! - Schedule reconciler (once, at boot)
//! - Beat loop invoking the ingestion worker
//! - REST API
//!
//! # Usage
//!
//! ```text
//! aspathd --config /etc/aspath/aspath.toml serve --port 8000
//! aspathd reconcile
//! aspathd show-config
//! ```

mod daemon;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use aspath_core::AspathConfig;

#[derive(Parser)]
#[command(name = "aspathd", about = "ASPATH daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "aspath.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile schedules, run the beat loop and serve the API.
    Serve {
        /// Port to listen on (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for the snapshot store (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Rebuild the schedule registry from configuration and exit.
    Reconcile {
        /// Data directory for the snapshot store (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the effective configuration.
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,aspathd=debug,aspath=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Serve { port, data_dir } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = data_dir {
                config.server.data_dir = dir;
            }
            daemon::serve(config).await
        }
        Command::Reconcile { data_dir } => {
            if let Some(dir) = data_dir {
                config.server.data_dir = dir;
            }
            daemon::reconcile_only(config).await
        }
        Command::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

/// A missing file means an empty configuration: defaults, no grabbers.
fn load_config(path: &Path) -> anyhow::Result<AspathConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(AspathConfig::default());
    }
    let config = AspathConfig::from_file(path)?;
    info!(
        path = %path.display(),
        grabbers = config.grabbers.len(),
        "configuration loaded"
    );
    Ok(config)
}
