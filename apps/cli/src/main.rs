//! EventFeed CLI: collect upcoming local events into a static JSON feed.
//!
//! Searches ticketing sites, extracts structured events with a hosted
//! language model and publishes `{ "events": [...] }` for a static site.

mod commands;

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
