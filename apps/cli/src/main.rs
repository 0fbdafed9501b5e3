//! DocBot CLI: crawl documentation, index it, and answer questions about it.
//!
//! Runs the crawl and indexing steps offline and serves answers over HTTP.

mod commands;
mod server;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
