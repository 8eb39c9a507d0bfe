//! Lumen CLI - rank image datasets against text prompts with CLIP.
//!
//! Lumen scores every image in a dataset against one or more weighted text
//! prompts, ranks them, and writes a report or exports a sorted/filtered
//! selection into a new collection.
//!
//! # Usage
//!
//! ```bash
//! # Rank a directory against a prompt
//! lumen rank ./photos --prompt "a dog on a beach"
//!
//! # Several weighted prompts, keep the best matches, export them
//! lumen rank ./photos --prompt "sunset" --weight 2 --prompt "people" --weight -1 \
//!     --filter above --threshold 0.25 --export-root ./exports
//!
//! # Manage models
//! lumen models download
//! ```

use std::io::IsTerminal;

use clap::{CommandFactory, Parser, Subcommand};

mod cli;
mod logging;

/// Lumen - prompt-based image ranking with CLIP.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a dataset against text prompts, then report or export the ranking
    Rank(cli::rank::RankArgs),

    /// Manage CLIP models (download, list, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go straight to stderr.
    let config = match lumen_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `lumen config path`."
            );
            lumen_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Lumen v{}", lumen_core::VERSION);

    match cli.command {
        Some(Commands::Rank(args)) => cli::rank::execute(args, config).await,
        Some(Commands::Models(args)) => cli::models::execute(args, &config).await,
        Some(Commands::Config(args)) => cli::config::execute(args).await,
        None if std::io::stdin().is_terminal() => cli::interactive::run(config).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
