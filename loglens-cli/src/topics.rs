use anyhow::Result;
use clap::Parser;

use crate::source::SourceArgs;

#[derive(Debug, Parser)]
pub struct Topics {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, help = "Print the listing as JSON")]
    pub json: bool,
}

pub async fn handle_topics(args: Topics) -> Result<()> {
    let source = args.source.connect().await?;
    let topics = source.topics().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&topics)?);
        return Ok(());
    }

    for topic in topics {
        println!("{} ({} partitions)", topic.name, topic.partition_count());
    }
    Ok(())
}
