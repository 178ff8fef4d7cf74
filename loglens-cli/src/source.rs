use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use loglens_archive::ArchiveSource;
use loglens_core::MessageSource;
use loglens_kafka::{KafkaSource, KafkaSourceConfig};

/// Backend selection shared by every subcommand: exactly one of a broker
/// bootstrap list or an archive directory.
#[derive(Debug, Args)]
pub struct SourceArgs {
    #[arg(
        long,
        short = 'b',
        help = "Bootstrap servers of a live cluster. Example: localhost:9092"
    )]
    pub brokers: Option<String>,

    #[arg(
        long,
        short = 'd',
        help = "Root directory of a saved-message archive",
        conflicts_with = "brokers"
    )]
    pub dir: Option<PathBuf>,
}

impl SourceArgs {
    pub async fn connect(&self) -> Result<Arc<dyn MessageSource>> {
        let source: Arc<dyn MessageSource> = match (&self.brokers, &self.dir) {
            (Some(brokers), None) => Arc::new(
                KafkaSource::connect(KafkaSourceConfig::new(brokers))
                    .with_context(|| format!("could not connect to {brokers}"))?,
            ),
            (None, Some(dir)) => Arc::new(ArchiveSource::new(dir.clone())),
            _ => bail!("pass exactly one of --brokers or --dir"),
        };
        if !source.validate_connection().await {
            bail!("the source is not reachable");
        }
        Ok(source)
    }
}
