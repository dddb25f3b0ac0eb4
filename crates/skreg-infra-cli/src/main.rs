//! skreg infrastructure CLI.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "skreg-infra")]
#[command(about = "Declare and preview skreg registry infrastructure", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, env = "SKREG_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved SKREG_* configuration
    Config,
    /// Apply the stack against the simulated engine and print its outputs
    Plan {
        /// Print the full run as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every declared resource in dependency order
    Graph {
        /// Print nodes as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Config => commands::config::show()?,
        Commands::Plan { json } => commands::plan::run(json).await?,
        Commands::Graph { json } => commands::graph::show(json)?,
    }

    Ok(())
}
