use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use loglens_core::{
    FetchOptions, FetchPosition, Message, MessageSource, MessageStream, Partition, Result, Topic,
    TopicCatalog,
};

use crate::index::{self, FileEntry};

/// Cap on concurrently open message files.
const MAX_PARALLEL_LOADS: usize = 20;
/// Files loaded per ordered chunk before flushing to the stream.
const LOAD_CHUNK_SIZE: usize = 100;

/// Retrieval engine over a saved-message directory tree
/// (`<root>/<topic>/<partition>/<offset>.{klm,txt}`).
///
/// Unlike the broker backend there is no live watermark: a partition's
/// "high" bound is its greatest discovered file offset and its count is the
/// number of files. A missing topic or partition directory yields an empty
/// stream rather than an error.
pub struct ArchiveSource {
    root: PathBuf,
    catalog: TopicCatalog,
}

impl ArchiveSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            catalog: TopicCatalog::new(),
        }
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        let mut topics = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(topics),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let partitions = index::list_partition_dirs(&path)
                .await?
                .into_iter()
                .map(|(id, _)| Partition::new(id))
                .collect();
            topics.push(Topic::with_partitions(name, partitions));
        }
        Ok(topics)
    }
}

#[async_trait]
impl MessageSource for ArchiveSource {
    async fn validate_connection(&self) -> bool {
        match fs::metadata(&self.root).await {
            Ok(meta) => meta.is_dir(),
            Err(_) => false,
        }
    }

    async fn topics(&self) -> Result<Vec<Topic>> {
        let topics = self.fetch_topics().await?;
        self.catalog.replace(topics);
        Ok(self.catalog.all())
    }

    async fn topic_stream(
        &self,
        topic: &str,
        options: FetchOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream> {
        let stream = MessageStream::new();
        let worker_stream = stream.clone();
        let topic_dir = self.root.join(topic);
        let topic = topic.to_string();
        tokio::spawn(async move {
            if let Err(e) = fetch_topic(topic_dir, options, &worker_stream, &cancel).await {
                error!(topic = %topic, error = %e, "archive topic fetch failed");
            }
            worker_stream.finish();
        });
        Ok(stream)
    }

    async fn partition_stream(
        &self,
        topic: &str,
        partition: i32,
        options: FetchOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream> {
        let stream = MessageStream::new();
        let worker_stream = stream.clone();
        let partition_dir = self.root.join(topic).join(partition.to_string());
        let topic = topic.to_string();
        tokio::spawn(async move {
            if let Err(e) =
                fetch_partition(partition_dir, partition, options, &worker_stream, &cancel).await
            {
                error!(topic = %topic, partition, error = %e, "archive partition fetch failed");
            }
            worker_stream.finish();
        });
        Ok(stream)
    }
}

/// A discovered file at topic scope, carrying the timestamp peeked from its
/// header so the global candidate set can be ordered across partitions.
struct Candidate {
    path: PathBuf,
    partition: i32,
    offset: i64,
    timestamp: i64,
}

async fn fetch_topic(
    topic_dir: PathBuf,
    options: FetchOptions,
    stream: &MessageStream,
    cancel: &CancellationToken,
) -> Result<()> {
    let partition_dirs = index::list_partition_dirs(&topic_dir).await?;

    // Discover every file under every partition and peek its timestamp,
    // bounded to MAX_PARALLEL_LOADS concurrently open files.
    let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_LOADS));
    let mut peeks = Vec::new();
    for (partition, dir) in partition_dirs {
        let files = index::list_partition_files(&dir).await?;
        for entry in files {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            peeks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                let timestamp = match index::peek_file_timestamp(&entry.path).await {
                    Ok(ts) => ts,
                    Err(e) => {
                        warn!(file = %entry.path.display(), error = %e, "failed to read timestamp, assuming 0");
                        0
                    }
                };
                Some(Candidate {
                    path: entry.path,
                    partition,
                    offset: entry.offset,
                    timestamp,
                })
            }));
        }
    }

    let mut candidates: Vec<Candidate> = join_all(peeks)
        .await
        .into_iter()
        .filter_map(|joined| joined.ok())
        .flatten()
        .collect();

    if cancel.is_cancelled() {
        return Ok(());
    }

    // Global ordering across partitions is by timestamp; a from-end start
    // flips the sort only to select the newest files before the limit is
    // applied. Delivery is always timestamp-ascending.
    let from_end = options.start.is_from_end();
    if from_end {
        candidates.sort_by(|a, b| (b.timestamp, b.offset).cmp(&(a.timestamp, a.offset)));
    } else {
        candidates.sort_by(|a, b| (a.timestamp, a.offset).cmp(&(b.timestamp, b.offset)));
    }

    if let FetchPosition::Timestamp(start_ts) = options.start {
        candidates.retain(|c| c.timestamp >= start_ts);
    }
    candidates.truncate(options.limit);
    if from_end {
        candidates.reverse();
    }

    load_in_chunks(candidates, stream, cancel).await;
    Ok(())
}

async fn fetch_partition(
    partition_dir: PathBuf,
    partition: i32,
    options: FetchOptions,
    stream: &MessageStream,
    cancel: &CancellationToken,
) -> Result<()> {
    if options.limit == 0 {
        return Ok(());
    }
    let files = index::list_partition_files(&partition_dir).await?;

    let selected: Vec<FileEntry> = if let FetchPosition::Timestamp(start_ts) = options.start {
        // No timestamp index exists: scan files in ascending offset order,
        // reading each, until `limit` matches are found.
        let mut matches = Vec::new();
        for entry in files {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match index::read_message_file(&entry.path).await {
                Ok(message) if message.epoch_millis >= start_ts => {
                    matches.push(entry);
                    if matches.len() >= options.limit {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(file = %entry.path.display(), error = %e, "skipping unreadable message file");
                }
            }
        }
        matches
    } else {
        select_offset_range(&files, &options)
    };

    load_partition_chunks(selected, partition, stream, cancel).await;
    Ok(())
}

/// Resolve start/end positions into an index range over the offset-sorted
/// file list, then apply the limit. Negative positions count from the end
/// (`index = total + offset`; the inclusive end maps to `total + end + 1`).
fn select_offset_range(files: &[FileEntry], options: &FetchOptions) -> Vec<FileEntry> {
    let total = files.len() as i64;

    let start_index = match options.start {
        FetchPosition::Start => 0,
        FetchPosition::End => total,
        FetchPosition::Offset(o) if o >= 0 => {
            files.partition_point(|entry| entry.offset < o) as i64
        }
        FetchPosition::Offset(o) => (total + o).max(0),
        FetchPosition::Timestamp(_) => 0, // handled by the caller
    };

    let end_index = match options.end {
        None | Some(FetchPosition::End) => total,
        Some(FetchPosition::Start) => start_index,
        Some(FetchPosition::Offset(o)) if o >= 0 => {
            let past_last = files.partition_point(|entry| entry.offset <= o) as i64;
            if past_last > 0 {
                past_last
            } else {
                start_index
            }
        }
        Some(FetchPosition::Offset(o)) => (total + o + 1).max(start_index),
        Some(FetchPosition::Timestamp(_)) => total,
    };

    let count = (end_index - start_index).max(0) as usize;
    files
        .iter()
        .skip(start_index as usize)
        .take(count)
        .take(options.limit)
        .cloned()
        .collect()
}

async fn load_partition_chunks(
    selected: Vec<FileEntry>,
    partition: i32,
    stream: &MessageStream,
    cancel: &CancellationToken,
) {
    let candidates = selected
        .into_iter()
        .map(|entry| Candidate {
            path: entry.path,
            partition,
            offset: entry.offset,
            timestamp: 0,
        })
        .collect();
    load_in_chunks(candidates, stream, cancel).await;
}

/// Load the selected files in fixed-size chunks with bounded parallelism.
/// The worker pool does not preserve order within a chunk, so each chunk is
/// re-sorted by `(epoch_millis, offset)` before it is flushed. Per-file
/// failures are logged and dropped without aborting the fetch.
async fn load_in_chunks(
    candidates: Vec<Candidate>,
    stream: &MessageStream,
    cancel: &CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_LOADS));

    for chunk in candidates.chunks(LOAD_CHUNK_SIZE) {
        if cancel.is_cancelled() {
            break;
        }

        let mut loads = Vec::with_capacity(chunk.len());
        for candidate in chunk {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let path = candidate.path.clone();
            let partition = candidate.partition;
            loads.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                match index::read_message_file(&path).await {
                    Ok(mut message) => {
                        message.partition = partition;
                        Some(message)
                    }
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "failed to load message file");
                        None
                    }
                }
            }));
        }

        let mut batch: Vec<Message> = join_all(loads)
            .await
            .into_iter()
            .filter_map(|joined| joined.ok())
            .flatten()
            .collect();

        batch.sort_by(|a, b| (a.epoch_millis, a.offset).cmp(&(b.epoch_millis, b.offset)));
        debug!(count = batch.len(), "flushing archive chunk");
        stream.push_batch(batch);
    }
}
