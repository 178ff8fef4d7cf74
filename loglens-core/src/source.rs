use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::position::FetchOptions;
use crate::stream::MessageStream;
use crate::topic::Topic;

/// The retrieval contract implemented by both backends (live broker and
/// saved-message archive).
///
/// The stream-returning operations validate synchronously and return a live
/// [`MessageStream`] that fills from background workers; the stream's
/// `finished` signal fires when the fetch completes or is cancelled.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Cheap reachability probe: cluster metadata for a broker, directory
    /// existence for an archive.
    async fn validate_connection(&self) -> bool;

    /// List topics, refreshing the cached catalog wholesale on every call.
    async fn topics(&self) -> Result<Vec<Topic>>;

    /// Fetch across all partitions of `topic`.
    async fn topic_stream(
        &self,
        topic: &str,
        options: FetchOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream>;

    /// Fetch from a single partition of `topic`.
    async fn partition_stream(
        &self,
        topic: &str,
        partition: i32,
        options: FetchOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream>;
}
