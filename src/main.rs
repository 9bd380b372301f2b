mod auth;
mod cli;
mod config;
mod error;
mod mcp;
mod models;
mod sheets;

use clap::Parser;

use crate::cli::Cli;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays clean for data and the tool protocol
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error!(kind = %e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}
