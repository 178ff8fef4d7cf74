use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use loglens_core::codec::text;
use loglens_core::{FetchOptions, FetchPosition, Message};

use crate::source::SourceArgs;

#[derive(Debug, Parser)]
#[command(after_help = EXAMPLES_TEXT)]
pub struct Fetch {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, short = 't', help = "The topic to fetch from")]
    pub topic: String,

    #[arg(
        long,
        short = 'p',
        help = "Fetch a single partition instead of the whole topic"
    )]
    pub partition: Option<i32>,

    #[arg(
        long,
        default_value = "end",
        help = "Where to start: 'start', 'end', an offset (negative counts from the end), or '@<timestamp>'"
    )]
    pub from: String,

    #[arg(long, help = "Inclusive upper offset bound (archives only)")]
    pub to: Option<i64>,

    #[arg(
        long,
        short = 'n',
        default_value = "100",
        help = "Maximum number of messages across all partitions"
    )]
    pub limit: usize,

    #[arg(long, help = "Print each message as a JSON object")]
    pub json: bool,
}

const EXAMPLES_TEXT: &str = r#"
EXAMPLES:
    # The last 100 messages of a topic on a live cluster
    loglens fetch -b localhost:9092 -t orders

    # 50 messages from partition 3, starting at offset 1200
    loglens fetch -b localhost:9092 -t orders -p 3 --from 1200 -n 50

    # Everything since a point in time, from a saved-message archive
    loglens fetch -d ./archive -t orders --from @2024-01-01T00:00:00Z -n 1000
"#;

fn parse_position(text: &str) -> Result<FetchPosition> {
    match text {
        "start" => Ok(FetchPosition::Start),
        "end" => Ok(FetchPosition::End),
        _ => {
            if let Some(stamp) = text.strip_prefix('@') {
                let Some(epoch_millis) = text::parse_timestamp(stamp) else {
                    bail!("could not parse timestamp '{stamp}'");
                };
                return Ok(FetchPosition::Timestamp(epoch_millis));
            }
            match text.parse::<i64>() {
                Ok(offset) => Ok(FetchPosition::Offset(offset)),
                Err(_) => bail!("invalid position '{text}'"),
            }
        }
    }
}

pub async fn handle_fetch(args: Fetch) -> Result<()> {
    let source = args.source.connect().await?;

    let mut options = FetchOptions::new(parse_position(&args.from)?, args.limit);
    if let Some(to) = args.to {
        options = options.with_end(FetchPosition::Offset(to));
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let stream = match args.partition {
        Some(partition) => {
            source
                .partition_stream(&args.topic, partition, options, cancel)
                .await?
        }
        None => source.topic_stream(&args.topic, options, cancel).await?,
    };

    // Drain incrementally so long fetches show progress as batches land.
    let mut printed = 0;
    loop {
        for message in stream.tail_from(printed) {
            print_message(&message, args.json)?;
            printed += 1;
        }
        if !stream.has_more() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    for message in stream.tail_from(printed) {
        print_message(&message, args.json)?;
        printed += 1;
    }

    eprintln!("{printed} messages");
    Ok(())
}

fn print_message(message: &Message, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({
                "partition": message.partition,
                "offset": message.offset,
                "timestamp": text::format_timestamp(message.epoch_millis),
                "key": message.key_text(),
                "value": message.value_text(),
            }))?
        );
        return Ok(());
    }
    println!(
        "[{}/{}] {} key={} {}",
        message.partition,
        message.offset,
        text::format_timestamp(message.epoch_millis),
        message.key_text(),
        message.value_text()
    );
    Ok(())
}
