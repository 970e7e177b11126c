//! EchoNet CLI: the main entry point.
//!
//! Commands:
//! - `onboard` : Write a starter config and sensor registry
//! - `notary`  : Notarize JSON-line facts from stdin into the ledger
//! - `fleet`   : Poll the ledger and answer questions interactively
//! - `ask`     : Answer a single question
//! - `summary` : Print the facts summary
//! - `status`  : Show configuration and ledger health

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "echonet",
    about = "EchoNet: shared noise-fact ledger",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.echonet/config.toml)
    #[arg(short, long, global = true, env = "ECHONET_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Read fact submissions (one JSON object per line) from stdin and notarize them
    Notary {
        /// Keep the existing ledger instead of resetting it to the header
        #[arg(long)]
        resume: bool,
    },

    /// Keep the ledger cache fresh and answer questions typed on stdin
    Fleet,

    /// Answer one question from the current ledger
    Ask {
        /// The question
        query: String,
    },

    /// Print the facts the fleet manager would hand to the model
    Summary {
        /// Print per-location statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and ledger health
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Notary { resume } => commands::notary::run(config, resume).await?,
        Commands::Fleet => commands::fleet::run(config).await?,
        Commands::Ask { query } => commands::ask::run(config, &query).await?,
        Commands::Summary { json } => commands::summary::run(config, json).await?,
        Commands::Status => commands::status::run(config).await?,
    }

    Ok(())
}
