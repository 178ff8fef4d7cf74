use std::time::Duration;

use loglens_core::{Message, SourceError, Topic};

/// Low/high watermark pair for a single partition.
///
/// `low` is the first retained offset, `high` is one past the last written
/// offset, so `high - low` is the number of retrievable messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    pub low: i64,
    pub high: i64,
}

impl Watermarks {
    pub fn count(&self) -> i64 {
        self.high - self.low
    }
}

/// Outcome of a single consumer poll.
#[derive(Debug)]
pub enum ConsumePoll {
    /// A message arrived.
    Message(Message),
    /// Nothing arrived within the poll timeout.
    TimedOut,
    /// The consumer reached the end of the assigned partition.
    EndOfPartition,
    /// The poll failed; the worker stops and reports the reason.
    Failed(String),
}

/// A consumer bound to one partition at a time.
///
/// Implementations are blocking; the engine drives them from dedicated
/// blocking tasks.
pub trait BrokerConsumer: Send {
    /// Assign the consumer to `partition` of `topic`, positioned at `offset`.
    fn assign(&mut self, topic: &str, partition: i32, offset: i64) -> Result<(), SourceError>;

    /// Wait up to `timeout` for the next message on the assignment.
    fn poll(&mut self, timeout: Duration) -> ConsumePoll;

    /// Drop the current assignment so the consumer can be reused.
    fn unassign(&mut self);
}

/// Broker metadata and consumer factory behind which the transport lives.
pub trait BrokerApi: Send + Sync + 'static {
    /// List every topic on the cluster with its partition layout.
    fn fetch_metadata(&self, timeout: Duration) -> Result<Vec<Topic>, SourceError>;

    /// Query the watermarks of a single partition.
    fn fetch_watermarks(
        &self,
        topic: &str,
        partition: i32,
        timeout: Duration,
    ) -> Result<Watermarks, SourceError>;

    /// Translate a timestamp into the earliest offset at or after it, for
    /// each listed partition. A negative result means no such message exists
    /// on that partition.
    fn offsets_for_times(
        &self,
        topic: &str,
        partitions: &[i32],
        epoch_millis: i64,
        timeout: Duration,
    ) -> Result<Vec<i64>, SourceError>;

    /// Build a fresh consumer for one retrieval worker.
    fn create_consumer(&self) -> Result<Box<dyn BrokerConsumer>, SourceError>;
}
