mod fetch;
mod source;
mod topics;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fetch::Fetch;
use topics::Topics;

#[derive(Debug, Parser)]
#[command(name = "loglens")]
#[command(about = "Browse messages on a live cluster or in a saved-message archive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List topics and their partition counts")]
    Topics(Topics),

    #[command(about = "Fetch messages from a topic or a single partition")]
    Fetch(Fetch),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Topics(topics) => topics::handle_topics(topics).await?,
        Commands::Fetch(fetch) => fetch::handle_fetch(fetch).await?,
    }

    Ok(())
}
