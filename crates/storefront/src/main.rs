use anyhow::Result;
use clap::{Parser, Subcommand};
use storefront::cli::commands;
use storefront::config::ServiceConfig;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(
  about = "Storefront - Semantic Product Search\nCatalog indexing and retrieval with synthesized recommendations"
)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Build or refresh the vector index from the catalog dataset
  Index {
    /// Force a full rebuild even if the index is already populated
    #[arg(short, long)]
    force: bool,
  },
  /// Search the catalog and print a recommendation
  Search {
    /// Natural-language product query
    query: String,
    /// Number of results to return (1-10)
    #[arg(short, long, default_value = "5")]
    max_results: usize,
  },
  /// Show how many chunks the index holds
  Count,
  /// Query server logs for debugging and monitoring
  Logs {
    /// Maximum number of log entries to return
    #[arg(short, long, default_value = "50")]
    limit: usize,
    /// Filter by log level (info, warn, error, all)
    #[arg(long, default_value = "all")]
    level: String,
  },
}

async fn handle(command: Command) -> Result<()> {
  let config = ServiceConfig::from_env();

  match command {
    Command::Index { force } => commands::index_catalog(&config, force).await,
    Command::Search { query, max_results } => {
      let max_results = max_results.clamp(1, 10);
      commands::search_catalog(&config, &query, max_results).await
    }
    Command::Count => commands::count_chunks(&config).await,
    Command::Logs { limit, level } => commands::logs(limit, &level).await,
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  handle(cli.command).await?;
  Ok(())
}
