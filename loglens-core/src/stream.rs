use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::message::Message;

/// Append-only, cancellable delivery channel between the retrieval engine's
/// workers and the caller.
///
/// A retrieval call creates exactly one stream and returns it immediately;
/// workers append batches behind a single locked append point, and the
/// engine's terminal action flips `has_more` to false exactly once, which is
/// the only end-of-stream signal. Already-published entries are never
/// reordered.
#[derive(Debug, Clone, Default)]
pub struct MessageStream {
    shared: Arc<StreamShared>,
}

#[derive(Debug, Default)]
struct StreamShared {
    messages: Mutex<Vec<Message>>,
    no_more: AtomicBool,
    finished: Notify,
}

impl MessageStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of messages. Empty batches are ignored.
    pub fn push_batch(&self, batch: Vec<Message>) {
        if batch.is_empty() {
            return;
        }
        self.lock_messages().extend(batch);
    }

    /// Snapshot of everything published so far.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock_messages().clone()
    }

    /// Snapshot of messages published at or after index `start`, for callers
    /// that drain the stream incrementally.
    pub fn tail_from(&self, start: usize) -> Vec<Message> {
        let messages = self.lock_messages();
        if start >= messages.len() {
            return Vec::new();
        }
        messages[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock_messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        !self.shared.no_more.load(Ordering::Acquire)
    }

    /// Terminal action of the retrieval call: flips `has_more` to false and
    /// wakes everyone waiting in [`finished`](Self::finished). Idempotent.
    pub fn finish(&self) {
        self.shared.no_more.store(true, Ordering::Release);
        self.shared.finished.notify_waiters();
    }

    /// Wait until the producing engine has finished (or was cancelled).
    pub async fn finished(&self) {
        loop {
            if !self.has_more() {
                return;
            }
            let notified = self.shared.finished.notified();
            // finish() may have raced in between the check and registration
            if !self.has_more() {
                return;
            }
            notified.await;
        }
    }

    fn lock_messages(&self) -> MutexGuard<'_, Vec<Message>> {
        self.shared
            .messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn msg(offset: i64) -> Message {
        Message::new(offset, HashMap::new(), None, None, 0, offset)
    }

    #[test]
    fn push_preserves_publication_order() {
        let stream = MessageStream::new();
        stream.push_batch(vec![msg(0), msg(1)]);
        stream.push_batch(vec![msg(2)]);
        stream.push_batch(Vec::new());

        let snapshot = stream.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(
            snapshot.iter().map(|m| m.offset).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(stream.tail_from(2).len(), 1);
        assert!(stream.tail_from(5).is_empty());
    }

    #[tokio::test]
    async fn finished_wakes_when_engine_completes() {
        let stream = MessageStream::new();
        assert!(stream.has_more());

        let waiter = stream.clone();
        let handle = tokio::spawn(async move { waiter.finished().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.finish();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake after finish")
            .expect("waiter task");
        assert!(!stream.has_more());
    }

    #[tokio::test]
    async fn finished_returns_immediately_when_already_done() {
        let stream = MessageStream::new();
        stream.finish();
        stream.finish(); // idempotent
        tokio::time::timeout(Duration::from_millis(100), stream.finished())
            .await
            .expect("already finished");
    }
}
