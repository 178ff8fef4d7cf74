use dashmap::DashMap;

use crate::errors::{Result, SourceError};
use crate::topic::Topic;

/// Cached topic/partition metadata shared by both backends.
///
/// The catalog is refreshed wholesale (clear, then repopulate) on every
/// `topics()` call of a source; it is never patched incrementally, so a topic
/// may disappear between two calls and readers must tolerate that.
#[derive(Debug, Default)]
pub struct TopicCatalog {
    topics: DashMap<String, Topic>,
}

impl TopicCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire cached topic set.
    pub fn replace(&self, topics: Vec<Topic>) {
        self.topics.clear();
        for topic in topics {
            self.topics.insert(topic.name.clone(), topic);
        }
    }

    pub fn get(&self, name: &str) -> Option<Topic> {
        self.topics.get(name).map(|entry| entry.value().clone())
    }

    /// All cached topics, ordered by name for stable listings.
    pub fn all(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .topics
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Validation used before any fetch starts.
    pub fn expect_topic(&self, name: &str) -> Result<Topic> {
        self.get(name)
            .ok_or_else(|| SourceError::TopicNotFound(name.to_string()))
    }

    pub fn expect_partition(&self, name: &str, partition: i32) -> Result<Topic> {
        let topic = self.expect_topic(name)?;
        if !topic.has_partition(partition) {
            return Err(SourceError::PartitionNotFound {
                topic: name.to_string(),
                partition,
            });
        }
        Ok(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_clears_previous_topics() {
        let catalog = TopicCatalog::new();
        catalog.replace(vec![Topic::new("orders", 2), Topic::new("users", 1)]);
        assert_eq!(catalog.all().len(), 2);

        catalog.replace(vec![Topic::new("orders", 3)]);
        let topics = catalog.all();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].partition_count(), 3);
        assert!(catalog.get("users").is_none());
    }

    #[test]
    fn expect_partition_validates_range() {
        let catalog = TopicCatalog::new();
        catalog.replace(vec![Topic::new("orders", 2)]);

        assert!(catalog.expect_partition("orders", 1).is_ok());
        assert!(matches!(
            catalog.expect_partition("orders", 2),
            Err(SourceError::PartitionNotFound { partition: 2, .. })
        ));
        assert!(matches!(
            catalog.expect_partition("missing", 0),
            Err(SourceError::TopicNotFound(_))
        ));
    }
}
