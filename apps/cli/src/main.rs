//! ControlQA CLI — answer security-control questions from indexed evidence.
//!
//! Resolves Family/ControlID references against the local control store and
//! answers each generated question from semantic search results.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; real deployments export the keys directly.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
