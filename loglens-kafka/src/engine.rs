use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use loglens_core::{
    FetchOptions, FetchPosition, Message, MessageSource, MessageStream, Result, SourceError,
    Topic, TopicCatalog,
};

use crate::broker_api::{BrokerApi, BrokerConsumer, ConsumePoll, Watermarks};
use crate::client::{KafkaSourceConfig, RdKafkaBroker};

/// Cap on partitions consumed in parallel during a topic-wide fetch.
const MAX_CONCURRENT_FETCHES: usize = 20;
/// Workers flush to the stream every this-many messages.
const BATCH_SIZE: usize = 100;
/// Or after this long with an unflushed batch, whichever comes first.
const BATCH_INTERVAL: Duration = Duration::from_millis(100);

const WATERMARK_TIMEOUT: Duration = Duration::from_secs(10);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(3);
const CONSUME_TIMEOUT: Duration = Duration::from_secs(5);

/// Live-broker [`MessageSource`].
///
/// Holds one shared consumer for single-partition fetches; topic-wide fetches
/// create a private consumer per partition worker, at most
/// [`MAX_CONCURRENT_FETCHES`] active at once.
pub struct KafkaSource {
    api: Arc<dyn BrokerApi>,
    shared_consumer: Arc<Mutex<Box<dyn BrokerConsumer>>>,
    catalog: TopicCatalog,
}

/// Fully resolved fetch work for one partition.
#[derive(Debug, Clone, Copy)]
struct PartitionPlan {
    partition: i32,
    start_offset: i64,
    limit: usize,
}

impl KafkaSource {
    pub fn connect(config: KafkaSourceConfig) -> Result<Self> {
        let broker = RdKafkaBroker::connect(config)?;
        Self::with_api(Arc::new(broker))
    }

    /// Build a source over any [`BrokerApi`] implementation.
    pub fn with_api(api: Arc<dyn BrokerApi>) -> Result<Self> {
        let shared_consumer = api.create_consumer()?;
        Ok(KafkaSource {
            api,
            shared_consumer: Arc::new(Mutex::new(shared_consumer)),
            catalog: TopicCatalog::new(),
        })
    }

    async fn ensure_catalog(&self) -> Result<()> {
        if self.catalog.is_empty() {
            self.refresh_catalog().await?;
        }
        Ok(())
    }

    async fn refresh_catalog(&self) -> Result<Vec<Topic>> {
        let api = Arc::clone(&self.api);
        let topics = task::spawn_blocking(move || api.fetch_metadata(METADATA_TIMEOUT))
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))??;
        self.catalog.replace(topics);
        Ok(self.catalog.all())
    }

    /// Query every partition's watermarks concurrently, under one deadline.
    /// Any failure aborts the whole fetch before a stream is handed out.
    async fn resolve_watermarks(&self, topic: &str, partitions: &[i32]) -> Result<Vec<Watermarks>> {
        let queries: Vec<_> = partitions
            .iter()
            .map(|&partition| {
                let api = Arc::clone(&self.api);
                let topic = topic.to_string();
                task::spawn_blocking(move || {
                    api.fetch_watermarks(&topic, partition, WATERMARK_TIMEOUT)
                })
            })
            .collect();

        let joined = tokio::time::timeout(WATERMARK_TIMEOUT, join_all(queries))
            .await
            .map_err(|_| {
                SourceError::WatermarkResolution(format!(
                    "watermark query for topic {topic} timed out"
                ))
            })?;

        let mut watermarks = Vec::with_capacity(joined.len());
        for join_result in joined {
            let marks = join_result
                .map_err(|e| SourceError::WatermarkResolution(e.to_string()))??;
            watermarks.push(marks);
        }
        Ok(watermarks)
    }

    /// Resolve per-partition start offsets and limit shares for a fetch.
    async fn build_plans(
        &self,
        topic: &str,
        partitions: &[i32],
        options: &FetchOptions,
    ) -> Result<Vec<PartitionPlan>> {
        let watermarks = self.resolve_watermarks(topic, partitions).await?;

        let timestamp_offsets = match options.start {
            FetchPosition::Timestamp(epoch_millis) => {
                let api = Arc::clone(&self.api);
                let topic = topic.to_string();
                let partitions = partitions.to_vec();
                Some(
                    task::spawn_blocking(move || {
                        api.offsets_for_times(&topic, &partitions, epoch_millis, METADATA_TIMEOUT)
                    })
                    .await
                    .map_err(|e| SourceError::Connection(e.to_string()))??,
                )
            }
            _ => None,
        };

        let per_partition = options.split_across(partitions.len());
        let plans = partitions
            .iter()
            .zip(watermarks)
            .zip(per_partition)
            .enumerate()
            .map(|(i, ((&partition, marks), share))| {
                let start = match &timestamp_offsets {
                    // A negative translation means no message at/after the
                    // timestamp; starting at the high watermark yields none.
                    Some(offsets) if offsets[i] < 0 => FetchPosition::End,
                    Some(offsets) => FetchPosition::Offset(offsets[i]),
                    None => share.start,
                };
                PartitionPlan {
                    partition,
                    start_offset: start.resolve(marks.low, marks.high),
                    limit: share.limit.min(marks.count().max(0) as usize),
                }
            })
            .collect();
        Ok(plans)
    }

    /// Launch the background fetch and hand the stream back immediately.
    fn spawn_fetch(
        &self,
        topic: String,
        plans: Vec<PartitionPlan>,
        stream: MessageStream,
        cancel: CancellationToken,
    ) {
        let api = Arc::clone(&self.api);
        let shared_consumer = Arc::clone(&self.shared_consumer);
        tokio::spawn(async move {
            if let [plan] = plans[..] {
                // Single partition: reuse the shared consumer instead of
                // paying for a fresh connection.
                let worker_stream = stream.clone();
                let worker_cancel = cancel.clone();
                let worker_topic = topic.clone();
                let join = task::spawn_blocking(move || {
                    let mut consumer = lock_consumer(&shared_consumer);
                    fetch_partition_blocking(
                        consumer.as_mut(),
                        &worker_topic,
                        plan,
                        &worker_stream,
                        &worker_cancel,
                    );
                })
                .await;
                if let Err(e) = join {
                    error!(topic = %topic, error = %e, "partition fetch worker panicked");
                }
            } else {
                let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));
                let workers: Vec<_> = plans
                    .into_iter()
                    .map(|plan| {
                        let api = Arc::clone(&api);
                        let semaphore = Arc::clone(&semaphore);
                        let topic = topic.clone();
                        let worker_stream = stream.clone();
                        let worker_cancel = cancel.clone();
                        tokio::spawn(async move {
                            let Ok(_permit) = semaphore.acquire_owned().await else {
                                return;
                            };
                            if worker_cancel.is_cancelled() {
                                return;
                            }
                            let join = task::spawn_blocking(move || match api.create_consumer() {
                                Ok(mut consumer) => fetch_partition_blocking(
                                    consumer.as_mut(),
                                    &topic,
                                    plan,
                                    &worker_stream,
                                    &worker_cancel,
                                ),
                                Err(e) => error!(
                                    topic = %topic,
                                    partition = plan.partition,
                                    error = %e,
                                    "could not create partition consumer"
                                ),
                            })
                            .await;
                            if let Err(e) = join {
                                error!(partition = plan.partition, error = %e, "fetch worker panicked");
                            }
                        })
                    })
                    .collect();
                join_all(workers).await;
            }
            // The stream always completes, cancelled or not.
            stream.finish();
        });
    }
}

fn lock_consumer(
    consumer: &Mutex<Box<dyn BrokerConsumer>>,
) -> MutexGuard<'_, Box<dyn BrokerConsumer>> {
    consumer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Consume up to `plan.limit` messages from one partition, flushing batches
/// of [`BATCH_SIZE`] (or every [`BATCH_INTERVAL`]) into the stream. Runs on a
/// blocking thread.
fn fetch_partition_blocking(
    consumer: &mut dyn BrokerConsumer,
    topic: &str,
    plan: PartitionPlan,
    stream: &MessageStream,
    cancel: &CancellationToken,
) {
    if plan.limit == 0 {
        return;
    }
    if let Err(e) = consumer.assign(topic, plan.partition, plan.start_offset) {
        error!(topic, partition = plan.partition, error = %e, "partition assignment failed");
        return;
    }

    let mut remaining = plan.limit;
    let mut batch: Vec<Message> = Vec::with_capacity(BATCH_SIZE.min(plan.limit));
    let mut last_flush = Instant::now();

    while remaining > 0 && !cancel.is_cancelled() {
        match consumer.poll(CONSUME_TIMEOUT) {
            ConsumePoll::Message(message) => {
                batch.push(message);
                remaining -= 1;
                if batch.len() >= BATCH_SIZE || last_flush.elapsed() >= BATCH_INTERVAL {
                    stream.push_batch(std::mem::take(&mut batch));
                    last_flush = Instant::now();
                }
            }
            ConsumePoll::EndOfPartition => {
                debug!(topic, partition = plan.partition, "reached end of partition");
                break;
            }
            ConsumePoll::TimedOut => {
                debug!(topic, partition = plan.partition, "poll timed out with messages remaining");
                break;
            }
            ConsumePoll::Failed(reason) => {
                warn!(topic, partition = plan.partition, %reason, "consume failed");
                break;
            }
        }
    }

    stream.push_batch(batch);
    consumer.unassign();
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn validate_connection(&self) -> bool {
        let api = Arc::clone(&self.api);
        let probe = task::spawn_blocking(move || api.fetch_metadata(VALIDATE_TIMEOUT));
        match tokio::time::timeout(VALIDATE_TIMEOUT, probe).await {
            Ok(Ok(Ok(_))) => true,
            Ok(Ok(Err(e))) => {
                debug!(error = %e, "broker validation failed");
                false
            }
            _ => false,
        }
    }

    async fn topics(&self) -> Result<Vec<Topic>> {
        self.refresh_catalog().await
    }

    async fn topic_stream(
        &self,
        topic: &str,
        options: FetchOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream> {
        self.ensure_catalog().await?;
        let meta = self.catalog.expect_topic(topic)?;
        let partitions: Vec<i32> = meta.partitions.iter().map(|p| p.id).collect();
        let plans = self.build_plans(topic, &partitions, &options).await?;

        let stream = MessageStream::new();
        self.spawn_fetch(topic.to_string(), plans, stream.clone(), cancel);
        Ok(stream)
    }

    async fn partition_stream(
        &self,
        topic: &str,
        partition: i32,
        options: FetchOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream> {
        self.ensure_catalog().await?;
        self.catalog.expect_partition(topic, partition)?;
        let plans = self.build_plans(topic, &[partition], &options).await?;

        let stream = MessageStream::new();
        self.spawn_fetch(topic.to_string(), plans, stream.clone(), cancel);
        Ok(stream)
    }
}
