mod commands;
mod config;
mod format;
mod openai;
mod paper;
mod search;
mod sources;
mod zotero;

pub const USER_AGENT: &str = concat!("paper-finder/", env!("CARGO_PKG_VERSION"));

use clap::{Parser, Subcommand};
use commands::{AnalyzeArgs, Finder, PushArgs, SearchArgs};

/// Search academic papers across sources, rank them by relevance, and push them to Zotero.
#[derive(Parser)]
#[command(name = "paper-finder", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search for papers and save the results for `push`
    Search(SearchArgs),
    /// Push papers from the last search to Zotero
    Push(PushArgs),
    /// Identify themes and research gaps across the top papers for a query
    Analyze(AnalyzeArgs),
    /// List Zotero collections
    Collections,
    /// Show which integrations are configured
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("paper_finder=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting paper-finder");
    let config = config::Config::from_env()
        .inspect_err(|e| tracing::error!("invalid configuration: {e}"))?;
    let finder = Finder::new(config)?;

    let result = match &cli.command {
        Command::Search(args) => finder.search(args).await,
        Command::Push(args) => finder.push(args).await,
        Command::Analyze(args) => finder.analyze(args).await,
        Command::Collections => finder.collections().await,
        Command::Status => Ok(finder.status()),
    };

    match result {
        Ok(output) => {
            print!("{output}");
            Ok(())
        }
        Err(e) => {
            tracing::error!("{e}");
            if let Some(hint) = e.hint() {
                eprintln!("hint: {hint}");
            }
            Err(e.into())
        }
    }
}
