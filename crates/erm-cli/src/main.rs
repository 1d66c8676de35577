use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use erm_storage::MissionStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod clean;
mod mission;

#[derive(Parser)]
#[command(name = "erm")]
#[command(about = "EBIOS RM mission store CLI", long_about = None)]
struct Cli {
    /// Path to the mission database
    #[arg(long, global = true, default_value = "missions.db")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit missions
    Mission {
        #[command(subcommand)]
        action: mission::MissionCommand,
    },
    /// Delete manually created missions, keeping generated ones
    Clean(clean::CleanArgs),
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let cli = Cli::parse();
    let store = MissionStore::open(&cli.db)
        .with_context(|| format!("failed to open mission store at {}", cli.db.display()))?;

    match cli.command {
        Commands::Mission { action } => mission::run(&store, action),
        Commands::Clean(args) => clean::run(&store, args),
    }
}
