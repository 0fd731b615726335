//! Storefront REST Server
//!
//! HTTP API server for semantic catalog search: retrieval, caching, rate
//! limiting and summarized recommendations.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use storefront::config::ServiceConfig;
use storefront::server::server::start_server;

#[derive(Parser)]
#[command(name = "storefront_server")]
#[command(about = "Storefront REST API Server")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
struct Args {
  /// Server bind address
  #[arg(long, default_value = "127.0.0.1:8000")]
  bind: SocketAddr,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // Initialize logging with reduced verbosity for Lance and other noisy libraries
  let filter = if args.verbose {
    EnvFilter::new("info,lance=warn,lance_datafusion=warn,datafusion=warn")
  } else {
    EnvFilter::new("storefront=info,lance=error,lance_datafusion=error,datafusion=error,warn")
  };

  tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

  marlowe::info!(&format!("Starting Storefront REST Server v{}", env!("CARGO_PKG_VERSION")));
  marlowe::info!(&format!("Binding to address: {}", args.bind));

  let config = ServiceConfig::from_env();
  start_server(args.bind, config).await?;

  Ok(())
}
