use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Headers, Message as RdMessage};
use rdkafka::{Offset, Timestamp, TopicPartitionList};
use serde::{Deserialize, Serialize};

use loglens_core::{Message, SourceError, Topic};

use crate::broker_api::{BrokerApi, BrokerConsumer, ConsumePoll, Watermarks};

/// Connection settings for a live cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaSourceConfig {
    /// Comma separated `host:port` bootstrap list.
    pub bootstrap_servers: String,
    pub group_id: String,
    pub client_id: String,
    /// Upper bound on the bytes fetched per partition request.
    pub fetch_max_bytes: u32,
    /// Extra librdkafka properties passed through verbatim.
    pub properties: HashMap<String, String>,
}

impl Default for KafkaSourceConfig {
    fn default() -> Self {
        KafkaSourceConfig {
            bootstrap_servers: "localhost:9092".to_string(),
            group_id: "loglens".to_string(),
            client_id: "loglens".to_string(),
            fetch_max_bytes: 2_097_152,
            properties: HashMap::new(),
        }
    }
}

impl KafkaSourceConfig {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        KafkaSourceConfig {
            bootstrap_servers: bootstrap_servers.into(),
            ..Default::default()
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("client.id", &self.client_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("fetch.message.max.bytes", self.fetch_max_bytes.to_string())
            // Workers rely on the EOF signal to stop before their limit when
            // the partition runs dry.
            .set("enable.partition.eof", "true")
            .set_log_level(RDKafkaLogLevel::Warning);
        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
    }
}

/// [`BrokerApi`] backed by librdkafka.
///
/// One consumer is held for metadata and offset queries; retrieval workers
/// get their own through [`BrokerApi::create_consumer`].
pub(crate) struct RdKafkaBroker {
    config: KafkaSourceConfig,
    meta_consumer: BaseConsumer,
}

impl RdKafkaBroker {
    pub(crate) fn connect(config: KafkaSourceConfig) -> Result<Self, SourceError> {
        let meta_consumer = create_base_consumer(&config)?;
        Ok(RdKafkaBroker {
            config,
            meta_consumer,
        })
    }
}

fn create_base_consumer(config: &KafkaSourceConfig) -> Result<BaseConsumer, SourceError> {
    config
        .client_config()
        .create()
        .map_err(|e| SourceError::Connection(e.to_string()))
}

impl BrokerApi for RdKafkaBroker {
    fn fetch_metadata(&self, timeout: Duration) -> Result<Vec<Topic>, SourceError> {
        let metadata = self
            .meta_consumer
            .fetch_metadata(None, timeout)
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        Ok(metadata
            .topics()
            .iter()
            .map(|t| Topic::new(t.name(), t.partitions().len()))
            .collect())
    }

    fn fetch_watermarks(
        &self,
        topic: &str,
        partition: i32,
        timeout: Duration,
    ) -> Result<Watermarks, SourceError> {
        let (low, high) = self
            .meta_consumer
            .fetch_watermarks(topic, partition, timeout)
            .map_err(|e| SourceError::WatermarkResolution(e.to_string()))?;
        Ok(Watermarks { low, high })
    }

    fn offsets_for_times(
        &self,
        topic: &str,
        partitions: &[i32],
        epoch_millis: i64,
        timeout: Duration,
    ) -> Result<Vec<i64>, SourceError> {
        let mut query = TopicPartitionList::new();
        for &partition in partitions {
            query
                .add_partition_offset(topic, partition, Offset::Offset(epoch_millis))
                .map_err(|e| SourceError::Connection(e.to_string()))?;
        }
        let resolved = self
            .meta_consumer
            .offsets_for_times(query, timeout)
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        partitions
            .iter()
            .map(|&partition| {
                let elem = resolved
                    .find_partition(topic, partition)
                    .ok_or_else(|| {
                        SourceError::Connection(format!(
                            "no timestamp offset returned for partition {partition}"
                        ))
                    })?;
                match elem.offset() {
                    Offset::Offset(o) => Ok(o),
                    _ => Ok(-1),
                }
            })
            .collect()
    }

    fn create_consumer(&self) -> Result<Box<dyn BrokerConsumer>, SourceError> {
        let consumer = create_base_consumer(&self.config)?;
        Ok(Box::new(RdKafkaConsumer { consumer }))
    }
}

pub(crate) struct RdKafkaConsumer {
    consumer: BaseConsumer,
}

impl BrokerConsumer for RdKafkaConsumer {
    fn assign(&mut self, topic: &str, partition: i32, offset: i64) -> Result<(), SourceError> {
        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(topic, partition, Offset::Offset(offset))
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        self.consumer
            .assign(&assignment)
            .map_err(|e| SourceError::Connection(e.to_string()))
    }

    fn poll(&mut self, timeout: Duration) -> ConsumePoll {
        match self.consumer.poll(timeout) {
            None => ConsumePoll::TimedOut,
            Some(Ok(borrowed)) => ConsumePoll::Message(convert_message(&borrowed)),
            Some(Err(KafkaError::PartitionEOF(_))) => ConsumePoll::EndOfPartition,
            Some(Err(e)) => ConsumePoll::Failed(e.to_string()),
        }
    }

    fn unassign(&mut self) {
        // A failed unassign only matters for the next fetch; the assign there
        // reports it.
        let _ = self.consumer.unassign();
    }
}

fn convert_message(borrowed: &rdkafka::message::BorrowedMessage<'_>) -> Message {
    let epoch_millis = match borrowed.timestamp() {
        Timestamp::CreateTime(t) | Timestamp::LogAppendTime(t) => t,
        Timestamp::NotAvailable => 0,
    };
    let mut headers = HashMap::new();
    if let Some(borrowed_headers) = borrowed.headers() {
        for i in 0..borrowed_headers.count() {
            let header = borrowed_headers.get(i);
            headers.insert(
                header.key.to_string(),
                header.value.map(<[u8]>::to_vec).unwrap_or_default(),
            );
        }
    }
    Message {
        epoch_millis,
        key: borrowed.key().map(<[u8]>::to_vec),
        value: borrowed.payload().map(<[u8]>::to_vec),
        headers,
        partition: borrowed.partition(),
        offset: borrowed.offset(),
    }
}
